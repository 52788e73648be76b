//! Feature definitions for specific monitor models, taking precedence over
//! the built in table.

use std::{
    borrow::Cow,
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use log::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{Access, FeatureKind, FeatureMetadata, MetadataSource, NonTableFormat, SlValue};
use crate::ddc::edid::Edid;

/// Identifies a monitor model across individual units.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MonitorModelKey {
    pub mfg_id: String,
    pub model_name: String,
    pub product_code: u16,
}

impl MonitorModelKey {
    pub fn new(mfg_id: impl Into<String>, model_name: impl Into<String>, product_code: u16) -> Self {
        Self {
            mfg_id: mfg_id.into(),
            model_name: model_name.into(),
            product_code,
        }
    }

    pub fn from_edid(edid: &Edid) -> Self {
        Self::new(edid.mfg_id(), edid.model_name(), edid.product_code())
    }
}

/// Feature overrides of one monitor model.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DynamicFeatures {
    pub key: MonitorModelKey,
    features: BTreeMap<u8, FeatureMetadata>,
}

impl DynamicFeatures {
    pub fn new(key: MonitorModelKey) -> Self {
        Self {
            key,
            features: BTreeMap::new(),
        }
    }

    pub fn with_feature(mut self, mut meta: FeatureMetadata) -> Self {
        meta.source = MetadataSource::Dynamic;
        self.features.insert(meta.code, meta);
        self
    }

    /// Shorthand for a simple non continuous feature with named values.
    pub fn with_simple_feature(
        self,
        code: u8,
        name: impl Into<String>,
        access: Access,
        values: impl IntoIterator<Item = (u8, String)>,
    ) -> Self {
        let sl_values: Vec<SlValue> = values
            .into_iter()
            .map(|(value, name)| SlValue {
                value,
                name: Cow::Owned(name),
            })
            .collect();
        self.with_feature(FeatureMetadata {
            code,
            name: Cow::Owned(name.into()),
            kind: FeatureKind::SimpleNonContinuous,
            access,
            sl_values: Some(Cow::Owned(sl_values)),
            format: NonTableFormat::Standard,
            source: MetadataSource::Dynamic,
        })
    }

    pub fn get(&self, code: u8) -> Option<&FeatureMetadata> {
        self.features.get(&code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureMetadata> {
        self.features.values()
    }
}

/// Known model definitions, consulted when a display is first seen.
#[derive(Debug, Default, Clone)]
pub struct DynamicFeatureRegistry {
    models: HashMap<MonitorModelKey, Arc<DynamicFeatures>>,
}

impl DynamicFeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, features: DynamicFeatures) {
        debug!(
            "registering {} dynamic features for {} {}",
            features.features.len(),
            features.key.mfg_id,
            features.key.model_name
        );
        self.models.insert(features.key.clone(), Arc::new(features));
    }

    pub fn lookup(&self, key: &MonitorModelKey) -> Option<Arc<DynamicFeatures>> {
        self.models.get(key).cloned()
    }

    pub fn for_edid(&self, edid: &Edid) -> Option<Arc<DynamicFeatures>> {
        self.lookup(&MonitorModelKey::from_edid(edid))
    }
}
