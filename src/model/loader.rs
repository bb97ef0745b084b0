//! Load a model from a JSON file or a model directory, then normalise and validate it.

use crate::error::ModelError;
use crate::model::{Cube, Dimension, Hierarchy, Level, Model};
use std::collections::HashSet;
use std::path::Path;

const MODEL_FILE: &str = "model.json";
const DIMENSION_PREFIX: &str = "dim_";
const CUBE_PREFIX: &str = "cube_";

/// Load from `path`: a single JSON file, or a directory with `model.json`,
/// optional `dim_<name>.json` and `cube_<name>.json` files.
pub async fn load_model(path: &Path) -> Result<Model, ModelError> {
    let meta = tokio::fs::metadata(path).await.map_err(|source| ModelError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let model = if meta.is_dir() {
        load_directory(path).await?
    } else {
        let value = read_json(path).await?;
        model_from_json(value, &path.display().to_string())?
    };
    tracing::info!(
        path = %path.display(),
        model = %model.name,
        cubes = model.cubes.len(),
        dimensions = model.dimensions.len(),
        "model loaded"
    );
    Ok(model)
}

async fn load_directory(dir: &Path) -> Result<Model, ModelError> {
    let main = dir.join(MODEL_FILE);
    let value = read_json(&main).await?;
    let mut model: Model = serde_json::from_value(value).map_err(|source| ModelError::Parse {
        path: main.display().to_string(),
        source,
    })?;

    let mut entries = tokio::fs::read_dir(dir).await.map_err(|source| ModelError::Io {
        path: dir.display().to_string(),
        source,
    })?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|source| ModelError::Io {
        path: dir.display().to_string(),
        source,
    })? {
        files.push(entry.path());
    }
    // Directory order is platform dependent.
    files.sort();

    for file in files {
        let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.ends_with(".json") || name == MODEL_FILE {
            continue;
        }
        let shown = file.display().to_string();
        if name.starts_with(DIMENSION_PREFIX) {
            let dim: Dimension = serde_json::from_value(read_json(&file).await?)
                .map_err(|source| ModelError::Parse { path: shown, source })?;
            model.dimensions.push(dim);
        } else if name.starts_with(CUBE_PREFIX) {
            let cube: Cube = serde_json::from_value(read_json(&file).await?)
                .map_err(|source| ModelError::Parse { path: shown, source })?;
            model.cubes.push(cube);
        }
    }
    normalize(&mut model);
    validate(&model)?;
    Ok(model)
}

async fn read_json(path: &Path) -> Result<serde_json::Value, ModelError> {
    let shown = path.display().to_string();
    let text = tokio::fs::read_to_string(path).await.map_err(|source| ModelError::Io {
        path: shown.clone(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ModelError::Parse { path: shown, source })
}

/// Build a model from an already parsed JSON document. `origin` names the source in errors.
pub fn model_from_json(value: serde_json::Value, origin: &str) -> Result<Model, ModelError> {
    let mut model: Model = serde_json::from_value(value).map_err(|source| ModelError::Parse {
        path: origin.to_string(),
        source,
    })?;
    normalize(&mut model);
    validate(&model)?;
    Ok(model)
}

/// Dimensions without levels get a single level named after the dimension;
/// dimensions without hierarchies get a `default` hierarchy over all levels.
fn normalize(model: &mut Model) {
    for dim in &mut model.dimensions {
        if dim.levels.is_empty() {
            dim.levels.push(Level {
                name: dim.name.clone(),
                label: dim.label.clone(),
                key: None,
                label_attribute: None,
                attributes: Vec::new(),
            });
        }
        if dim.hierarchies.is_empty() {
            dim.hierarchies.push(Hierarchy {
                name: "default".into(),
                label: None,
                levels: dim.levels.iter().map(|l| l.name.clone()).collect(),
            });
        }
    }
}

fn validate(model: &Model) -> Result<(), ModelError> {
    if model.name.trim().is_empty() {
        return Err(ModelError::Invalid("model name is empty".into()));
    }
    let mut dim_names = HashSet::new();
    for dim in &model.dimensions {
        check_name("dimension", &dim.name)?;
        if !dim_names.insert(dim.name.as_str()) {
            return Err(ModelError::Duplicate {
                kind: "dimension",
                name: dim.name.clone(),
            });
        }
        let mut level_names = HashSet::new();
        for level in &dim.levels {
            check_name("level", &level.name)?;
            if !level_names.insert(level.name.as_str()) {
                return Err(ModelError::Duplicate {
                    kind: "level",
                    name: format!("{}.{}", dim.name, level.name),
                });
            }
        }
        for hierarchy in &dim.hierarchies {
            for level in &hierarchy.levels {
                if !level_names.contains(level.as_str()) {
                    return Err(ModelError::MissingReference {
                        kind: "level",
                        name: format!("{}.{}", dim.name, level),
                    });
                }
            }
        }
        if let Some(default) = &dim.default_hierarchy {
            if !dim.hierarchies.iter().any(|h| &h.name == default) {
                return Err(ModelError::MissingReference {
                    kind: "hierarchy",
                    name: format!("{}.{}", dim.name, default),
                });
            }
        }
    }
    let mut cube_names = HashSet::new();
    for cube in &model.cubes {
        check_name("cube", &cube.name)?;
        if !cube_names.insert(cube.name.as_str()) {
            return Err(ModelError::Duplicate {
                kind: "cube",
                name: cube.name.clone(),
            });
        }
        for dim in &cube.dimensions {
            if !dim_names.contains(dim.as_str()) {
                return Err(ModelError::MissingReference {
                    kind: "dimension",
                    name: dim.clone(),
                });
            }
        }
        for measure in &cube.measures {
            check_name("measure", &measure.name)?;
        }
    }
    if let Some(default) = &model.default_cube {
        if !cube_names.contains(default.as_str()) {
            return Err(ModelError::MissingReference {
                kind: "cube",
                name: default.clone(),
            });
        }
    }
    Ok(())
}

/// Names end up in URLs and as column name parts, so keep them plain.
fn check_name(kind: &str, name: &str) -> Result<(), ModelError> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(ModelError::Invalid(format!("invalid {} name '{}'", kind, name)))
    }
}
