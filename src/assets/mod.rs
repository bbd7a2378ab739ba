//! Embedded manifests and their rendering
//!
//! Assets are YAML manifests compiled into the binary. An [`AssetLoader`]
//! renders an asset by running its placeholders through a [`Replacer`] and
//! decodes the result into a `DynamicObject`.

mod bundle;
pub mod replace;

use crate::error::{Error, Result};
use kube::api::DynamicObject;

pub use replace::Replacer;

/// Raw content of an embedded asset
pub fn get(name: &str) -> Result<&'static str> {
    bundle::ASSETS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, content)| *content)
        .ok_or_else(|| Error::AssetNotFound {
            name: name.to_string(),
        })
}

/// Names of every embedded asset
pub fn names() -> impl Iterator<Item = &'static str> {
    bundle::ASSETS.iter().map(|(name, _)| *name)
}

/// Decode rendered YAML into an object with a name and kind
pub fn decode(name: &str, content: &str) -> Result<DynamicObject> {
    let object: DynamicObject =
        serde_yaml::from_str(content).map_err(|e| Error::AssetDecode {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
    if object.types.is_none() || object.metadata.name.is_none() {
        return Err(Error::AssetDecode {
            name: name.to_string(),
            reason: "missing apiVersion, kind or metadata.name".into(),
        });
    }
    Ok(object)
}

/// Every named asset exists and decodes once rendered with `replacer`
pub fn validate<'a>(
    names: impl IntoIterator<Item = &'a str>,
    replacer: &Replacer,
) -> Result<()> {
    let errors: Vec<Error> = names
        .into_iter()
        .filter_map(|name| {
            get(name)
                .and_then(|content| decode(name, &replacer.replace(content)))
                .err()
        })
        .collect();
    Error::aggregate(errors)
}

/// Renders assets with a fixed set of replacements
#[derive(Debug, Clone, Default)]
pub struct AssetLoader {
    replacer: Replacer,
}

impl AssetLoader {
    pub fn new(replacer: Replacer) -> Self {
        Self { replacer }
    }

    /// A loader applying this loader's replacements and then `extra`
    pub fn with(&self, extra: Replacer) -> Self {
        Self {
            replacer: self.replacer.clone().extend(extra),
        }
    }

    pub fn render(&self, name: &str) -> Result<String> {
        Ok(self.replacer.replace(get(name)?))
    }

    pub fn load(&self, name: &str) -> Result<DynamicObject> {
        decode(name, &self.render(name)?)
    }
}
