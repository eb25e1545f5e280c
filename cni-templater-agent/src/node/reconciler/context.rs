use std::sync::Arc;

use cni_templater_core::{
    plugin::cni::CniPlugin, reconciler::ConfigReconciler, template::field::FieldTemplateRenderer,
};

pub type CniConfigReconciler =
    ConfigReconciler<Arc<CniPlugin>, Arc<CniPlugin>, FieldTemplateRenderer>;

pub struct ReconcilerContext {
    pub node_name: String,
    pub config_reconciler: CniConfigReconciler,
}
