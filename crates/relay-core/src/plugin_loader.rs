use std::collections::HashMap;

use tracing::{info, warn};

use crate::error::{RelayError, Result};
use crate::plugin_trait::{PluginHealth, RelayPlugin};

/// Starts plugins in dependency order and stops them in reverse.
pub struct PluginLoader {
    plugins: HashMap<String, Box<dyn RelayPlugin>>,
    order: Vec<String>,
}

impl PluginLoader {
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn register(&mut self, plugin: Box<dyn RelayPlugin>) {
        let meta = plugin.meta();
        info!("Registered plugin: {} ({})", meta.name, meta.id);
        self.plugins.insert(meta.id, plugin);
    }

    pub fn resolve_order(&mut self) -> Result<()> {
        let mut visited: HashMap<String, bool> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        let mut ids: Vec<String> = self.plugins.keys().cloned().collect();
        ids.sort();
        for id in &ids {
            if !visited.contains_key(id) {
                self.topo_visit(id, &mut visited, &mut order)?;
            }
        }

        self.order = order;
        info!("Plugin start order: {:?}", self.order);
        Ok(())
    }

    fn topo_visit(
        &self,
        id: &str,
        visited: &mut HashMap<String, bool>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        if let Some(&in_progress) = visited.get(id) {
            if in_progress {
                return Err(RelayError::DependencyError(format!(
                    "Circular dependency detected at: {id}"
                )));
            }
            return Ok(());
        }

        visited.insert(id.to_string(), true);

        if let Some(plugin) = self.plugins.get(id) {
            let meta = plugin.meta();
            for dep in &meta.dependencies {
                if self.plugins.contains_key(&dep.plugin_id) {
                    self.topo_visit(&dep.plugin_id, visited, order)?;
                } else if !dep.optional {
                    return Err(RelayError::DependencyError(format!(
                        "Required dependency '{}' not found for plugin '{}'",
                        dep.plugin_id, id
                    )));
                } else {
                    warn!(
                        "Optional dependency '{}' not found for plugin '{}'",
                        dep.plugin_id, id
                    );
                }
            }
        }

        visited.insert(id.to_string(), false);
        order.push(id.to_string());
        Ok(())
    }

    pub async fn start_all(&mut self) -> Result<()> {
        self.resolve_order()?;
        let order = self.order.clone();

        for id in &order {
            let plugin = self
                .plugins
                .get_mut(id)
                .ok_or_else(|| RelayError::PluginNotFound(id.clone()))?;
            info!("Starting plugin: {id}");
            plugin.start().await?;
        }

        Ok(())
    }

    pub async fn stop_all(&mut self) -> Result<()> {
        let order: Vec<String> = self.order.iter().rev().cloned().collect();

        for id in &order {
            if let Some(plugin) = self.plugins.get_mut(id) {
                info!("Stopping plugin: {id}");
                if let Err(e) = plugin.stop().await {
                    warn!("Error stopping plugin {id}: {e}");
                }
            }
        }

        Ok(())
    }

    /// Health of every registered plugin, in start order.
    pub async fn health_all(&self) -> Vec<(String, PluginHealth)> {
        let mut report = Vec::with_capacity(self.order.len());
        for id in &self.order {
            if let Some(plugin) = self.plugins.get(id) {
                report.push((id.clone(), plugin.health().await));
            }
        }
        report
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }
}

impl Default for PluginLoader {
    fn default() -> Self {
        Self::new()
    }
}
