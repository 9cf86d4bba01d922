//! 武将与技能的静态数据表。

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::game::{Controller, Faction};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SkillType {
    /// 锁定技
    Passive,
    Active,
    Trigger,
    Limit,
}

/// Documentation tag only; skills wire themselves through event subscriptions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SkillTiming {
    #[default]
    None,
    OnTurnStart,
    OnTurnEnd,
    OnDrawPhase,
    OnPlayPhase,
    OnDamaged,
    OnDealDamage,
    OnDying,
    OnKill,
    OnDeath,
    OnCardPlayed,
    OnCardUsed,
    OnCardDiscarded,
    BeforeJudge,
    AfterJudge,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillDefinition {
    pub id: String,
    pub name: String,
    pub skill_type: SkillType,
    #[serde(default)]
    pub timing: SkillTiming,
    /// Key into the skill factory registry.
    pub factory: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

impl SkillDefinition {
    pub fn new(id: &str, name: &str, skill_type: SkillType, timing: SkillTiming) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            skill_type,
            timing,
            factory: id.to_string(),
            description: String::new(),
            config: None,
        }
    }

    fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = Some(config);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub title: String,
    pub faction: Faction,
    pub max_hp: i32,
    #[serde(default = "default_attack_range")]
    pub attack_range: u8,
    #[serde(default)]
    pub skills: Vec<SkillDefinition>,
}

fn default_attack_range() -> u8 {
    1
}

impl GeneralDefinition {
    fn new(id: &str, name: &str, title: &str, faction: Faction, max_hp: i32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            title: title.to_string(),
            faction,
            max_hp,
            attack_range: default_attack_range(),
            skills: Vec::new(),
        }
    }

    fn skill(mut self, skill: SkillDefinition) -> Self {
        self.skills.push(skill);
        self
    }
}

/// 一局开始前每个座位的配置。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerSetup {
    pub name: String,
    pub general: String,
    #[serde(default)]
    pub controller: Controller,
}

impl PlayerSetup {
    pub fn new(name: impl Into<String>, general: impl Into<String>, controller: Controller) -> Self {
        Self {
            name: name.into(),
            general: general.into(),
            controller,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GeneralTable {
    generals: Vec<GeneralDefinition>,
}

impl GeneralTable {
    pub fn new(generals: Vec<GeneralDefinition>) -> Result<Self, ConfigError> {
        let table = Self { generals };
        table.validate()?;
        Ok(table)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let generals: Vec<GeneralDefinition> = serde_json::from_str(json)?;
        Self::new(generals)
    }

    pub fn builtin() -> &'static GeneralTable {
        &BUILTIN_GENERALS
    }

    pub fn get(&self, id: &str) -> Option<&GeneralDefinition> {
        self.generals.iter().find(|general| general.id == id)
    }

    pub fn generals(&self) -> &[GeneralDefinition] {
        &self.generals
    }

    pub fn skills(&self) -> impl Iterator<Item = &SkillDefinition> {
        self.generals.iter().flat_map(|general| general.skills.iter())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashMap::new();
        for general in &self.generals {
            if general.id.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "generals.id",
                    reason: format!("general `{}` has no id", general.name),
                });
            }
            if general.max_hp <= 0 {
                return Err(ConfigError::InvalidValue {
                    field: "generals.max_hp",
                    reason: format!("general `{}` must have positive max hp", general.id),
                });
            }
            if seen.insert(general.id.as_str(), ()).is_some() {
                return Err(ConfigError::InvalidValue {
                    field: "generals.id",
                    reason: format!("duplicate general id `{}`", general.id),
                });
            }
        }
        Ok(())
    }
}

static BUILTIN_GENERALS: Lazy<GeneralTable> = Lazy::new(|| GeneralTable {
    generals: vec![
        GeneralDefinition::new("liubei", "刘备", "乱世的枭雄", Faction::Shu, 4).skill(
            SkillDefinition::new("rende", "仁德", SkillType::Active, SkillTiming::OnPlayPhase)
                .describe("出牌阶段，可以将任意手牌交给其他角色；一回合内给出第二张时回复1点体力。")
                .with_config(serde_json::json!({ "heal_threshold": 2 })),
        ),
        GeneralDefinition::new("guanyu", "关羽", "美髯公", Faction::Shu, 4).skill(
            SkillDefinition::new("wusheng", "武圣", SkillType::Passive, SkillTiming::OnCardUsed)
                .describe("可以将红色牌当杀使用或打出。"),
        ),
        GeneralDefinition::new("zhangfei", "张飞", "万夫不当", Faction::Shu, 4).skill(
            SkillDefinition::new("paoxiao", "咆哮", SkillType::Passive, SkillTiming::OnPlayPhase)
                .describe("锁定技，出牌阶段使用杀无次数限制。"),
        ),
        GeneralDefinition::new("caocao", "曹操", "魏武帝", Faction::Wei, 4).skill(
            SkillDefinition::new("jianxiong", "奸雄", SkillType::Trigger, SkillTiming::OnDamaged)
                .describe("受到伤害后，可以获得造成伤害的牌。"),
        ),
        GeneralDefinition::new("sunquan", "孙权", "年轻的贤君", Faction::Wu, 4).skill(
            SkillDefinition::new("zhiheng", "制衡", SkillType::Active, SkillTiming::OnPlayPhase)
                .describe("出牌阶段限一次，弃置任意张牌，然后摸等量的牌。"),
        ),
        GeneralDefinition::new("lvbu", "吕布", "武的化身", Faction::Qun, 4),
        GeneralDefinition::new("zhaoyun", "赵云", "少年将军", Faction::Shu, 4),
        GeneralDefinition::new("zhouyu", "周瑜", "大都督", Faction::Wu, 3),
    ],
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_roster_has_skill_generals() {
        let table = GeneralTable::builtin();
        let caocao = table.get("caocao").expect("caocao should exist");
        assert_eq!(caocao.faction, Faction::Wei);
        assert_eq!(caocao.skills[0].factory, "jianxiong");
        assert!(table.get("nobody").is_none());
        assert_eq!(table.skills().count(), 5);
    }

    #[test]
    fn json_table_rejects_duplicates() {
        let json = r#"[
            {"id": "a", "name": "A", "faction": "Wei", "max_hp": 3},
            {"id": "a", "name": "B", "faction": "Wu", "max_hp": 4}
        ]"#;
        let err = GeneralTable::from_json(json).expect_err("duplicate ids");
        assert!(err.to_string().contains("duplicate general id"));
    }

    #[test]
    fn json_table_fills_defaults() {
        let json = r#"[{"id": "x", "name": "X", "faction": "Qun", "max_hp": 3,
            "skills": [{"id": "s", "name": "S", "skill_type": "Active", "factory": "zhiheng"}]}]"#;
        let table = GeneralTable::from_json(json).expect("table should parse");
        let general = table.get("x").expect("x exists");
        assert_eq!(general.attack_range, 1);
        assert_eq!(general.skills[0].timing, SkillTiming::None);
    }
}
