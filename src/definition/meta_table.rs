//! Per-class meta-function tables.

use std::rc::Rc;

use ember_core::{Access, MetaKey, TypeHash, TypeMode};

use super::{ClassDefinition, FunctionDef};

/// A resolved meta-function: where it lives and how to fetch it.
#[derive(Debug, Clone)]
pub struct MetaLink {
    /// Class that declares the function.
    pub owner: TypeHash,
    pub owner_name: Rc<str>,
    /// Tier of the declarations scope the function is fetched through.
    pub access: Access,
    pub name: &'static str,
    pub function: Rc<FunctionDef>,
}

/// Dense table of the meta-functions a class answers to.
#[derive(Debug)]
pub struct MetaTable {
    links: [Option<MetaLink>; MetaKey::COUNT],
}

impl MetaTable {
    /// Probe every catalogue name against `definition` and its bases.
    ///
    /// The most derived match wins. Annotation classes additionally probe the
    /// annotation hooks.
    pub(crate) fn build(definition: &Rc<ClassDefinition>) -> Self {
        let mut links: [Option<MetaLink>; MetaKey::COUNT] = std::array::from_fn(|_| None);
        let hooks: &[MetaKey] = if definition.type_mode() == TypeMode::Annotation {
            &MetaKey::ANNOTATION_KEYS
        } else {
            &[]
        };

        for &key in MetaKey::CLASS_KEYS.iter().chain(hooks) {
            let name = key.method_name();
            let Some(function) = definition.try_get_function(name, false, |_| true) else {
                continue;
            };
            let (owner, owner_name) = match function.owner() {
                Some(owner) => (owner.hash(), Rc::from(owner.name())),
                None => (definition.hash(), definition.name_rc().clone()),
            };
            links[key.slot()] = Some(MetaLink {
                owner,
                owner_name,
                access: function.access(),
                name,
                function,
            });
        }

        tracing::trace!(
            class = definition.name(),
            resolved = links.iter().filter(|l| l.is_some()).count(),
            "built meta table"
        );
        Self { links }
    }

    pub fn get(&self, key: MetaKey) -> Option<&MetaLink> {
        self.links[key.slot()].as_ref()
    }

    pub fn contains(&self, key: MetaKey) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.links.iter().filter(|l| l.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use crate::{Assembly, ClassBuilder, RuntimeConfig};

    #[test]
    fn most_derived_match_wins() {
        let assembly = Assembly::new(RuntimeConfig::default());
        assembly
            .define(
                ClassBuilder::new("Base")
                    .with_function(FunctionDef::script("opToString", |_| Ok(Value::from("b"))))
                    .with_function(FunctionDef::script("opLength", |_| Ok(Value::Int(1)))),
            )
            .unwrap();
        let derived = assembly
            .define(
                ClassBuilder::new("Derived")
                    .extends("Base")
                    .with_function(FunctionDef::script("opToString", |_| Ok(Value::from("d")))),
            )
            .unwrap();

        let table = derived.meta_table();
        let to_string = table.get(MetaKey::ToString).unwrap();
        assert_eq!(&*to_string.owner_name, "Derived");
        let length = table.get(MetaKey::Length).unwrap();
        assert_eq!(length.owner, TypeHash::from_name("Base"));
        assert!(!table.contains(MetaKey::Add));
    }

    #[test]
    fn hooks_only_probed_on_annotations() {
        let assembly = Assembly::new(RuntimeConfig::default());
        let plain = assembly
            .define(
                ClassBuilder::new("Plain")
                    .with_function(FunctionDef::script("onPreConstruct", |_| Ok(Value::Null))),
            )
            .unwrap();
        let annotation = assembly
            .define(
                ClassBuilder::new("Hooked")
                    .with_mode(TypeMode::Annotation)
                    .with_function(FunctionDef::script("onPreConstruct", |_| Ok(Value::Null))),
            )
            .unwrap();

        assert!(!plain.meta_table().contains(MetaKey::PreConstruct));
        assert!(annotation.meta_table().contains(MetaKey::PreConstruct));
    }

    #[test]
    fn built_once() {
        let assembly = Assembly::new(RuntimeConfig::default());
        let class = assembly.define(ClassBuilder::new("Plain")).unwrap();
        let first = class.meta_table() as *const MetaTable;
        let second = class.meta_table() as *const MetaTable;
        assert_eq!(first, second);
    }
}
