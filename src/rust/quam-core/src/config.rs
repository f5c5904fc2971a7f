// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Compilation of a tree into the configuration of the control runtime.
//!
//! Every component of the tree contributes to a shared configuration document
//! exactly once, in declaration order unless components constrain the order
//! through [`ConfigSettings`].

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use serde_json::json;

use crate::error::{Error, Result};
use crate::node::{Node, NodeKind};
use crate::reference;
use crate::value::Value;

/// Configuration document consumed by the control runtime.
pub type QuaConfig = serde_json::Value;

/// Hooks of a component class into config generation.
pub trait ComponentBehavior {
    /// Add the component's contribution to the configuration.
    fn apply_to_config(&self, component: &Node, config: &mut QuaConfig) -> Result<()> {
        let _ = (component, config);
        Ok(())
    }

    /// Ordering constraints of the component relative to other components.
    fn config_settings(&self, component: &Node) -> Result<Option<ConfigSettings>> {
        let _ = component;
        Ok(None)
    }
}

/// Components that must be applied before or after a component.
///
/// Entries are component nodes or references to them, resolved relative to
/// the constrained component.
#[derive(Debug, Clone, Default)]
pub struct ConfigSettings {
    /// Components applied after this one.
    pub before: Vec<Value>,
    /// Components applied before this one.
    pub after: Vec<Value>,
}

/// Default skeleton the components contribute to.
pub fn qua_config_template() -> QuaConfig {
    json!({
        "version": 1,
        "controllers": {},
        "elements": {},
        "pulses": {
            "const_pulse": {
                "operation": "control",
                "length": 1000,
                "waveforms": {"I": "const_wf", "Q": "zero_wf"},
            }
        },
        "waveforms": {
            "zero_wf": {"type": "constant", "sample": 0.0},
            "const_wf": {"type": "constant", "sample": 0.1},
        },
        "digital_waveforms": {"ON": {"samples": [[1, 0]]}},
        "integration_weights": {},
        "mixers": {},
        "oscillators": {},
    })
}

/// All components owned by `node`, depth first in declaration order.
///
/// References are not followed, and a component held in several slots is
/// yielded once.
pub fn iterate_components(node: &Node) -> Vec<Node> {
    let mut seen = HashSet::new();
    let mut components = Vec::new();
    collect_components(node, &mut seen, &mut components);
    components
}

fn collect_components(node: &Node, seen: &mut HashSet<usize>, components: &mut Vec<Node>) {
    if !seen.insert(node.id()) {
        return;
    }
    if node.kind() == NodeKind::Component {
        components.push(node.clone());
    }
    for child in node.child_nodes() {
        collect_components(&child, seen, components);
    }
}

fn config_settings(component: &Node) -> Result<Option<ConfigSettings>> {
    match component.class().and_then(|class| class.behavior()) {
        Some(behavior) => behavior.config_settings(component),
        None => Ok(None),
    }
}

/// Order components so that all `before`/`after` constraints hold.
///
/// Unconstrained components keep their relative order. If the constraints are
/// cyclic, the components that cannot be ordered follow in their original
/// order and a warning is logged.
pub fn sort_components(components: &[Node]) -> Result<Vec<Node>> {
    let positions: HashMap<usize, usize> = components
        .iter()
        .enumerate()
        .map(|(index, component)| (component.id(), index))
        .collect();
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); components.len()];
    let mut in_degree = vec![0usize; components.len()];
    for (index, component) in components.iter().enumerate() {
        let Some(settings) = config_settings(component)? else {
            continue;
        };
        for target in &settings.after {
            let target = position_of(component, target, &positions)?;
            successors[target].push(index);
            in_degree[index] += 1;
        }
        for target in &settings.before {
            let target = position_of(component, target, &positions)?;
            successors[index].push(target);
            in_degree[target] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(index, _)| Reverse(index))
        .collect();
    let mut order = Vec::with_capacity(components.len());
    let mut placed = vec![false; components.len()];
    while let Some(Reverse(index)) = ready.pop() {
        order.push(index);
        placed[index] = true;
        for &next in &successors[index] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }
    if order.len() < components.len() {
        quam_log::warn!(
            "Unable to sort QuamComponents based on config_settings. \
            This may cause issues when generating the QUA config."
        );
        order.extend((0..components.len()).filter(|index| !placed[*index]));
    }
    Ok(order.into_iter().map(|index| components[index].clone()).collect())
}

fn position_of(
    component: &Node,
    target: &Value,
    positions: &HashMap<usize, usize>,
) -> Result<usize> {
    let resolved = match target.as_reference() {
        Some(reference) => reference::resolve(component, reference)?,
        None => target.clone(),
    };
    resolved
        .as_node()
        .and_then(|node| positions.get(&node.id()).copied())
        .ok_or_else(|| {
            Error::Ordering(format!(
                "{} is constrained relative to {target}, which is not a component of the tree",
                component.describe()
            ))
        })
}

/// Generate the configuration of the tree under `root` from the default
/// template.
pub fn generate_config(root: &Node) -> Result<QuaConfig> {
    generate_config_with_template(root, qua_config_template())
}

/// Generate the configuration of the tree under `root`, starting from
/// `template`.
///
/// The first failing component aborts generation.
pub fn generate_config_with_template(root: &Node, template: QuaConfig) -> Result<QuaConfig> {
    if !root.is_root() {
        return Err(Error::WrongNodeKind {
            expected: NodeKind::Root.to_string(),
            found: root.class_name(),
        });
    }
    let mut config = template;
    let components = sort_components(&iterate_components(root))?;
    for component in &components {
        if let Some(behavior) = component.class().and_then(|class| class.behavior()) {
            quam_log::diagnostic!("Adding {} to the config", component.describe());
            behavior.apply_to_config(component, &mut config)?;
        }
    }
    generate_config_final_actions(&mut config);
    Ok(config)
}

/// Give every analog output and input of the controllers a DC offset of 0 V
/// unless one is set.
pub fn generate_config_final_actions(config: &mut QuaConfig) {
    let Some(controllers) = config
        .get_mut("controllers")
        .and_then(serde_json::Value::as_object_mut)
    else {
        return;
    };
    for controller in controllers.values_mut() {
        if let Some(fems) = controller
            .get_mut("fems")
            .and_then(serde_json::Value::as_object_mut)
        {
            for fem in fems.values_mut() {
                if fem.get("type").and_then(serde_json::Value::as_str) != Some("LF") {
                    continue;
                }
                default_offsets(fem);
            }
        }
        default_offsets(controller);
    }
}

fn default_offsets(ports: &mut serde_json::Value) {
    for key in ["analog_outputs", "analog_inputs"] {
        let Some(entries) = ports.get_mut(key).and_then(serde_json::Value::as_object_mut) else {
            continue;
        };
        for port in entries.values_mut() {
            if let Some(port) = port.as_object_mut() {
                port.entry("offset").or_insert(json!(0.0));
            }
        }
    }
}
