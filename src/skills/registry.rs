use std::collections::HashMap;

use log::warn;
use once_cell::sync::Lazy;
use thiserror::Error;

use super::{Jianxiong, Paoxiao, Rende, SkillBehavior, Wusheng, Zhiheng};
use crate::data::SkillDefinition;
use crate::game::PlayerId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkillError {
    #[error("skill `{skill_id}` refers to unknown factory `{factory}`")]
    UnknownFactory { skill_id: String, factory: String },
    #[error("skill `{skill_id}` has invalid config: {reason}")]
    InvalidConfig { skill_id: String, reason: String },
    #[error("player {owner} cannot receive skills")]
    OwnerUnavailable { owner: PlayerId },
}

type Factory = fn(&SkillDefinition) -> Result<Box<dyn SkillBehavior>, SkillError>;

fn jianxiong(_: &SkillDefinition) -> Result<Box<dyn SkillBehavior>, SkillError> {
    Ok(Box::new(Jianxiong::default()))
}

fn paoxiao(_: &SkillDefinition) -> Result<Box<dyn SkillBehavior>, SkillError> {
    Ok(Box::new(Paoxiao))
}

fn wusheng(_: &SkillDefinition) -> Result<Box<dyn SkillBehavior>, SkillError> {
    Ok(Box::new(Wusheng))
}

fn zhiheng(_: &SkillDefinition) -> Result<Box<dyn SkillBehavior>, SkillError> {
    Ok(Box::new(Zhiheng::default()))
}

fn rende(definition: &SkillDefinition) -> Result<Box<dyn SkillBehavior>, SkillError> {
    Ok(Box::new(Rende::from_definition(definition)?))
}

/// 工厂键到构造函数的编译期注册表。
static FACTORIES: Lazy<HashMap<&'static str, Factory>> = Lazy::new(|| {
    let mut factories: HashMap<&'static str, Factory> = HashMap::new();
    factories.insert("jianxiong", jianxiong);
    factories.insert("paoxiao", paoxiao);
    factories.insert("wusheng", wusheng);
    factories.insert("zhiheng", zhiheng);
    factories.insert("rende", rende);
    factories
});

pub fn is_registered(factory: &str) -> bool {
    FACTORIES.contains_key(factory)
}

pub fn create_behavior(definition: &SkillDefinition) -> Result<Box<dyn SkillBehavior>, SkillError> {
    let factory = FACTORIES
        .get(definition.factory.as_str())
        .ok_or_else(|| SkillError::UnknownFactory {
            skill_id: definition.id.clone(),
            factory: definition.factory.clone(),
        })?;
    factory(definition)
}

/// Checks every definition against the registry before a game starts.
pub fn validate_skill_table<'a, I>(definitions: I) -> Vec<SkillError>
where
    I: IntoIterator<Item = &'a SkillDefinition>,
{
    let errors: Vec<SkillError> = definitions
        .into_iter()
        .filter_map(|definition| create_behavior(definition).err())
        .collect();
    for err in &errors {
        warn!("{err}");
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::GeneralTable;
    use crate::game::fixtures;

    #[test]
    fn builtin_skills_all_resolve() {
        let errors = validate_skill_table(GeneralTable::builtin().skills());
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        assert!(is_registered("wusheng"));
        assert!(!is_registered("guanxing"));
    }

    #[test]
    fn validation_reports_unknown_keys() {
        let mut broken = fixtures::skill("zhiheng");
        broken.id = "broken".to_string();
        broken.factory = "nope".to_string();
        let good = fixtures::skill("paoxiao");

        let errors = validate_skill_table([&good, &broken]);
        assert_eq!(
            errors,
            vec![SkillError::UnknownFactory {
                skill_id: "broken".to_string(),
                factory: "nope".to_string(),
            }]
        );
    }
}
