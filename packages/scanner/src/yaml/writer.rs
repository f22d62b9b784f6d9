//! YAML writer for register maps.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use regscan_tree::Tree;
use serde::Serialize;

use crate::error::Result;
use crate::types::{BitfieldEntry, Device, Peripheral, RegNode, RegisterEntry};
use crate::visit::{walk, NodeVisitor};

/// Bit-field representation for YAML serialization.
#[derive(Debug, Serialize)]
struct YamlBitfield {
    name: String,
    bits: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    logical_bits: Option<String>,
    reset: String,
}

impl From<&BitfieldEntry> for YamlBitfield {
    fn from(b: &BitfieldEntry) -> Self {
        Self {
            name: b.name.clone(),
            bits: b.bits.to_string(),
            logical_bits: (b.logical_bits != b.bits).then(|| b.logical_bits.to_string()),
            reset: format!("{:#x}", b.reset),
        }
    }
}

/// Register representation for YAML serialization.
#[derive(Debug, Serialize)]
struct YamlRegister {
    name: String,
    offset: String,
    reset: String,
    page: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bitfields: Vec<YamlBitfield>,
}

impl From<&RegisterEntry> for YamlRegister {
    fn from(r: &RegisterEntry) -> Self {
        Self {
            name: r.name.clone(),
            offset: format!("{:#06x}", r.offset),
            reset: format!("{:#06x}", r.reset),
            page: r.page,
            bitfields: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct YamlPeripheral {
    name: String,
    registers: Vec<YamlRegister>,
}

/// Full device representation for YAML serialization.
#[derive(Debug, Default, Serialize)]
struct YamlDevice {
    device: String,
    peripherals: Vec<YamlPeripheral>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    exceptions: Vec<String>,
}

/// Collects the tree into the serializable structure.
///
/// Registers outside a peripheral and bit-fields outside a register have no
/// place in the document and are dropped.
#[derive(Default)]
struct Exporter {
    doc: YamlDevice,
    in_peripheral: bool,
    in_register: bool,
}

impl NodeVisitor for Exporter {
    fn visit_device(&mut self, device: &Device) {
        self.doc.device = device.name.clone();
    }

    fn visit_peripheral(&mut self, peripheral: &Peripheral) {
        self.doc.peripherals.push(YamlPeripheral {
            name: peripheral.name.clone(),
            registers: Vec::new(),
        });
        self.in_peripheral = true;
    }

    fn visit_register(&mut self, register: &RegisterEntry) {
        if !self.in_peripheral {
            tracing::debug!(register = %register.name, "Register outside peripheral, not exported");
            return;
        }
        if let Some(p) = self.doc.peripherals.last_mut() {
            p.registers.push(YamlRegister::from(register));
            self.in_register = true;
        }
    }

    fn visit_bitfield(&mut self, bitfield: &BitfieldEntry) {
        if !self.in_register {
            return;
        }
        if let Some(r) = self
            .doc
            .peripherals
            .last_mut()
            .and_then(|p| p.registers.last_mut())
        {
            r.bitfields.push(YamlBitfield::from(bitfield));
        }
    }

    fn leave(&mut self, node: &RegNode) {
        match node {
            RegNode::Peripheral(_) => self.in_peripheral = false,
            RegNode::Register(_) => self.in_register = false,
            _ => {}
        }
    }
}

/// Generate the YAML document for a scanned device tree.
pub fn generate_yaml(tree: &Tree<RegNode>, exceptions: &[String]) -> Result<String> {
    let mut exporter = Exporter::default();
    walk(tree, &mut exporter);
    exporter.doc.exceptions = exceptions.to_vec();

    let yaml_string = serde_yaml_ng::to_string(&exporter.doc)?;
    let lines: Vec<&str> = yaml_string.lines().map(str::trim_end).collect();
    Ok(format!("---\n{}\n", lines.join("\n")))
}

/// Path of the YAML file for `device` inside `output_dir`.
#[must_use]
pub fn output_path(output_dir: &Path, device: &Device) -> PathBuf {
    output_dir.join(format!("{}.yaml", device.to_slug()))
}

/// Save a scanned device tree as `<output_dir>/<device slug>.yaml`.
///
/// Writes to a temp file, syncs it to disk, then renames it over the target.
pub fn save_yaml(tree: &Tree<RegNode>, exceptions: &[String], output_dir: &Path) -> Result<PathBuf> {
    let device = match tree.value(tree.root()) {
        Some(RegNode::Device(d)) => d.clone(),
        _ => Device::new("device"),
    };
    fs::create_dir_all(output_dir)?;

    let output_file = output_path(output_dir, &device);
    let temp_file = output_dir.join(format!(".{}.yaml.tmp", device.to_slug()));
    let content = generate_yaml(tree, exceptions)?;

    {
        let mut file = File::create(&temp_file)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }

    // On Windows, rename fails if the destination already exists
    #[cfg(target_os = "windows")]
    if output_file.exists() {
        fs::remove_file(&output_file)?;
    }

    fs::rename(&temp_file, &output_file)?;
    Ok(output_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BitRange;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn create_test_tree() -> Tree<RegNode> {
        let mut tree = Tree::new(RegNode::Device(Device::new("Demo Device")));
        let abc = tree.add(
            tree.root(),
            RegNode::Peripheral(Peripheral {
                name: "ABC".to_string(),
            }),
        );
        let ctrl = tree.add(
            abc,
            RegNode::Register(RegisterEntry {
                name: "ABC_CTRL".to_string(),
                offset: 0x10,
                reset: 0,
                page: 12,
            }),
        );
        tree.add(
            ctrl,
            RegNode::Bitfield(BitfieldEntry {
                name: "MODE".to_string(),
                bits: BitRange::new(15, 14),
                logical_bits: BitRange::new(15, 14),
                reset: 2,
            }),
        );
        tree.add(
            ctrl,
            RegNode::Bitfield(BitfieldEntry {
                name: "VALUE".to_string(),
                bits: BitRange::new(13, 0),
                logical_bits: BitRange::new(7, 0),
                reset: 0,
            }),
        );
        tree
    }

    #[test]
    fn test_generate_yaml() {
        let yaml = generate_yaml(&create_test_tree(), &["ABC_STAT".to_string()]).unwrap();

        assert!(yaml.starts_with("---\n"));
        assert!(yaml.contains("device: Demo Device"));
        assert!(yaml.contains("name: ABC_CTRL"));
        assert!(yaml.contains("page: 12"));
        assert!(yaml.contains("15:14"));
        assert!(yaml.contains("7:0"));
        assert!(yaml.contains("ABC_STAT"));
        // logical bits equal to the physical ones are left out
        assert_eq!(yaml.matches("logical_bits").count(), 1);
    }

    #[test]
    fn test_generated_yaml_parses_back() {
        let yaml = generate_yaml(&create_test_tree(), &[]).unwrap();
        let value: serde_yaml_ng::Value = serde_yaml_ng::from_str(&yaml).unwrap();

        let register = &value["peripherals"][0]["registers"][0];
        assert_eq!(register["offset"].as_str(), Some("0x0010"));
        assert_eq!(register["bitfields"][0]["reset"].as_str(), Some("0x2"));
        assert!(value.get("exceptions").is_none());
    }

    #[test]
    fn test_save_yaml() {
        let temp_dir = tempdir().unwrap();
        let path = save_yaml(&create_test_tree(), &[], temp_dir.path()).unwrap();

        assert_eq!(path, temp_dir.path().join("demo_device.yaml"));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("name: VALUE"));
        assert!(!temp_dir.path().join(".demo_device.yaml.tmp").exists());
    }
}
