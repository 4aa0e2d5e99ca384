//! Rendering of conditions, key conditions and updates into engine expression
//! strings.
//!
//! Every attribute name goes through a `#nN` placeholder and every value
//! through a `:vN` placeholder, so reserved words and special characters in
//! attribute names never reach the expression text.

use std::collections::{BTreeMap, HashMap};

use crate::entity::Changes;
use crate::item::{AttributeValue, Item};
use crate::keys::Index;

use super::condition::{Condition, KeyCondition, SortCondition};

/// Accumulates placeholders while expressions are rendered.
///
/// One builder is used per request so that the condition, key condition and
/// update expressions share a single set of name and value maps.
#[derive(Debug, Default)]
pub struct ExpressionBuilder {
    names: BTreeMap<String, String>,
    name_lookup: HashMap<String, String>,
    values: Item,
}

impl ExpressionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholder for an attribute name. Repeated names share a placeholder.
    pub fn name(&mut self, attribute: &str) -> String {
        if let Some(placeholder) = self.name_lookup.get(attribute) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.names.len());
        self.names
            .insert(placeholder.clone(), attribute.to_string());
        self.name_lookup
            .insert(attribute.to_string(), placeholder.clone());
        placeholder
    }

    /// Placeholder for a value.
    pub fn value(&mut self, value: AttributeValue) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    pub fn condition(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::ItemExists => {
                let n = self.name(Condition::existence_attribute());
                format!("attribute_exists({n})")
            }
            Condition::ItemNotExists => {
                let n = self.name(Condition::existence_attribute());
                format!("attribute_not_exists({n})")
            }
            Condition::Equals(name, value) => {
                let n = self.name(name);
                let v = self.value(value.clone());
                format!("{n} = {v}")
            }
            Condition::NotEquals(name, value) => {
                let n = self.name(name);
                let v = self.value(value.clone());
                format!("{n} <> {v}")
            }
            Condition::AttributeExists(name) => {
                let n = self.name(name);
                format!("attribute_exists({n})")
            }
            Condition::AttributeNotExists(name) => {
                let n = self.name(name);
                format!("attribute_not_exists({n})")
            }
            Condition::BeginsWith(name, prefix) => {
                let n = self.name(name);
                let v = self.value(AttributeValue::S(prefix.clone()));
                format!("begins_with({n}, {v})")
            }
            Condition::And(all) => match all.as_slice() {
                // An empty conjunction holds for every row.
                [] => {
                    let n = self.name(Condition::existence_attribute());
                    format!("(attribute_exists({n}) OR attribute_not_exists({n}))")
                }
                [single] => self.condition(single),
                many => many
                    .iter()
                    .map(|c| format!("({})", self.condition(c)))
                    .collect::<Vec<_>>()
                    .join(" AND "),
            },
        }
    }

    pub fn key_condition(&mut self, index: Index, condition: &KeyCondition) -> String {
        let pk = self.name(index.partition_attribute());
        let pv = self.value(AttributeValue::S(condition.partition.clone()));
        let mut rendered = format!("{pk} = {pv}");

        if let Some(sort) = &condition.sort {
            let sk = self.name(index.sort_attribute());
            let clause = match sort {
                SortCondition::Eq(v) => format!("{sk} = {}", self.string(v)),
                SortCondition::Lt(v) => format!("{sk} < {}", self.string(v)),
                SortCondition::Le(v) => format!("{sk} <= {}", self.string(v)),
                SortCondition::Gt(v) => format!("{sk} > {}", self.string(v)),
                SortCondition::Ge(v) => format!("{sk} >= {}", self.string(v)),
                SortCondition::Between(lo, hi) => {
                    let lo = self.string(lo);
                    let hi = self.string(hi);
                    format!("{sk} BETWEEN {lo} AND {hi}")
                }
                SortCondition::BeginsWith(prefix) => {
                    format!("begins_with({sk}, {})", self.string(prefix))
                }
            };
            rendered.push_str(" AND ");
            rendered.push_str(&clause);
        }

        rendered
    }

    /// Renders `SET` and `REMOVE` clauses. Empty when `changes` is empty.
    pub fn update(&mut self, changes: &Changes) -> String {
        let mut sets = Vec::new();
        for (name, value) in changes.set_attributes() {
            let n = self.name(name);
            let v = self.value(value.clone());
            sets.push(format!("{n} = {v}"));
        }
        for (name, value) in changes.set_if_absent_attributes() {
            let n = self.name(name);
            let v = self.value(value.clone());
            sets.push(format!("{n} = if_not_exists({n}, {v})"));
        }
        let removes: Vec<String> = changes
            .removed_attributes()
            .iter()
            .map(|name| self.name(name))
            .collect();

        let mut clauses = Vec::new();
        if !sets.is_empty() {
            clauses.push(format!("SET {}", sets.join(", ")));
        }
        if !removes.is_empty() {
            clauses.push(format!("REMOVE {}", removes.join(", ")));
        }
        clauses.join(" ")
    }

    /// Projection expression listing the given attributes.
    pub fn projection(&mut self, attributes: &[&str]) -> String {
        attributes
            .iter()
            .map(|a| self.name(a))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn names(&self) -> &BTreeMap<String, String> {
        &self.names
    }

    pub fn values(&self) -> &Item {
        &self.values
    }

    /// Consumes the builder, returning the name and value maps.
    pub fn into_parts(self) -> (BTreeMap<String, String>, Item) {
        (self.names, self.values)
    }

    fn string(&mut self, s: &str) -> String {
        self.value(AttributeValue::S(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_deduplicated() {
        let mut b = ExpressionBuilder::new();
        assert_eq!(b.name("status"), "#n0");
        assert_eq!(b.name("email"), "#n1");
        assert_eq!(b.name("status"), "#n0");
        assert_eq!(b.names().len(), 2);
    }

    #[test]
    fn test_existence_conditions() {
        let mut b = ExpressionBuilder::new();
        assert_eq!(b.condition(&Condition::ItemNotExists), "attribute_not_exists(#n0)");
        assert_eq!(b.condition(&Condition::ItemExists), "attribute_exists(#n0)");
        assert_eq!(b.names().get("#n0").map(String::as_str), Some("PK"));
    }

    #[test]
    fn test_compound_condition() {
        let mut b = ExpressionBuilder::new();
        let cond = Condition::ItemExists.and(Condition::equals("status", "active"));
        assert_eq!(
            b.condition(&cond),
            "(attribute_exists(#n0)) AND (#n1 = :v0)"
        );
        assert_eq!(b.values().get(":v0"), Some(&AttributeValue::from("active")));
    }

    #[test]
    fn test_empty_and_is_a_tautology() {
        let mut b = ExpressionBuilder::new();
        assert_eq!(
            b.condition(&Condition::And(vec![])),
            "(attribute_exists(#n0) OR attribute_not_exists(#n0))"
        );
    }

    #[test]
    fn test_key_condition() {
        let mut b = ExpressionBuilder::new();
        let cond = KeyCondition::partition("USER#u1")
            .with_sort(SortCondition::BeginsWith("VERIF#".into()));
        assert_eq!(
            b.key_condition(Index::Gsi1, &cond),
            "#n0 = :v0 AND begins_with(#n1, :v1)"
        );
        assert_eq!(b.names().get("#n0").map(String::as_str), Some("GSI1PK"));
        assert_eq!(b.names().get("#n1").map(String::as_str), Some("GSI1SK"));
    }

    #[test]
    fn test_key_condition_between() {
        let mut b = ExpressionBuilder::new();
        let cond =
            KeyCondition::partition("p").with_sort(SortCondition::Between("a".into(), "z".into()));
        assert_eq!(
            b.key_condition(Index::Table, &cond),
            "#n0 = :v0 AND #n1 BETWEEN :v1 AND :v2"
        );
    }

    #[test]
    fn test_update_expression() {
        let mut changes = Changes::new();
        changes
            .set("name", "Ada")
            .set_if_absent("createdAt", "2024")
            .remove("reason");

        let mut b = ExpressionBuilder::new();
        assert_eq!(
            b.update(&changes),
            "SET #n0 = :v0, #n1 = if_not_exists(#n1, :v1) REMOVE #n2"
        );
        let (names, values) = b.into_parts();
        assert_eq!(names.get("#n2").map(String::as_str), Some("reason"));
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_update_expression_remove_only() {
        let mut changes = Changes::new();
        changes.remove("a").remove("b");
        let mut b = ExpressionBuilder::new();
        assert_eq!(b.update(&changes), "REMOVE #n0, #n1");
        assert!(b.values().is_empty());
    }

    #[test]
    fn test_projection() {
        let mut b = ExpressionBuilder::new();
        assert_eq!(b.projection(&["PK", "SK"]), "#n0, #n1");
    }
}
