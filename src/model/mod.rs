//! Analytical model: cubes, dimensions, levels and hierarchies. Loaded once, never mutated.

mod loader;

pub use loader::{load_model, model_from_json};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_cube: Option<String>,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub cubes: Vec<Cube>,
    #[serde(default, skip_serializing)]
    pub translations: HashMap<String, ModelTranslation>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub levels: Vec<Level>,
    #[serde(default)]
    pub hierarchies: Vec<Hierarchy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_hierarchy: Option<String>,
}

/// In model files a level may be a bare name or a full object.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "LevelSpec")]
pub struct Level {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_attribute: Option<String>,
    pub attributes: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LevelSpec {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        key: Option<String>,
        #[serde(default)]
        label_attribute: Option<String>,
        #[serde(default)]
        attributes: Vec<String>,
    },
}

impl From<LevelSpec> for Level {
    fn from(spec: LevelSpec) -> Self {
        match spec {
            LevelSpec::Name(name) => Level {
                name,
                label: None,
                key: None,
                label_attribute: None,
                attributes: Vec::new(),
            },
            LevelSpec::Full {
                name,
                label,
                key,
                label_attribute,
                attributes,
            } => Level {
                name,
                label,
                key,
                label_attribute,
                attributes,
            },
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Hierarchy {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub levels: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Measure {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cube {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub measures: Vec<Measure>,
    /// Names of model dimensions this cube is analysed by.
    #[serde(default)]
    pub dimensions: Vec<String>,
    /// Denormalised fact view (optionally `schema.view`); defaults to the cube name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fact: Option<String>,
    /// Fact key column; defaults to `id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Label overrides for one locale. Level keys are `dimension.level`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ModelTranslation {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub dimensions: HashMap<String, String>,
    #[serde(default)]
    pub levels: HashMap<String, String>,
    #[serde(default)]
    pub cubes: HashMap<String, String>,
    #[serde(default)]
    pub measures: HashMap<String, String>,
}

impl Model {
    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn cube(&self, name: &str) -> Option<&Cube> {
        self.cubes.iter().find(|c| c.name == name)
    }

    /// The configured default cube, else the first cube.
    pub fn default_cube(&self) -> Option<&Cube> {
        match &self.default_cube {
            Some(name) => self.cube(name),
            None => self.cubes.first(),
        }
    }

    /// Copy of the model with labels replaced from the translation for `locale`, if any.
    pub fn localized(&self, locale: Option<&str>) -> Model {
        let mut model = self.clone();
        let Some(tr) = locale.and_then(|l| self.translations.get(l)) else {
            return model;
        };
        model.locale = locale.map(str::to_string);
        if tr.label.is_some() {
            model.label = tr.label.clone();
        }
        if tr.description.is_some() {
            model.description = tr.description.clone();
        }
        for dim in &mut model.dimensions {
            if let Some(label) = tr.dimensions.get(&dim.name) {
                dim.label = Some(label.clone());
            }
            for level in &mut dim.levels {
                if let Some(label) = tr.levels.get(&format!("{}.{}", dim.name, level.name)) {
                    level.label = Some(label.clone());
                }
            }
        }
        for cube in &mut model.cubes {
            if let Some(label) = tr.cubes.get(&cube.name) {
                cube.label = Some(label.clone());
            }
            for measure in &mut cube.measures {
                if let Some(label) = tr.measures.get(&format!("{}.{}", cube.name, measure.name)) {
                    measure.label = Some(label.clone());
                }
            }
        }
        model
    }
}

impl Dimension {
    pub fn level(&self, name: &str) -> Option<&Level> {
        self.levels.iter().find(|l| l.name == name)
    }

    /// Named default hierarchy, else the first one. The loader guarantees at least one.
    pub fn default_hierarchy(&self) -> Option<&Hierarchy> {
        match &self.default_hierarchy {
            Some(name) => self.hierarchies.iter().find(|h| &h.name == name),
            None => self.hierarchies.first(),
        }
    }

    /// Levels of the default hierarchy, top-down.
    pub fn default_levels(&self) -> Vec<&Level> {
        self.default_hierarchy()
            .map(|h| h.levels.iter().filter_map(|l| self.level(l)).collect())
            .unwrap_or_default()
    }
}

impl Cube {
    pub fn fact_view(&self) -> &str {
        self.fact.as_deref().unwrap_or(&self.name)
    }

    pub fn key_column(&self) -> &str {
        self.key.as_deref().unwrap_or("id")
    }

    pub fn has_dimension(&self, name: &str) -> bool {
        self.dimensions.iter().any(|d| d == name)
    }
}
