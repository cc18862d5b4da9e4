use serde::Serialize;

/// One flattened row of the block device inventory.
///
/// Partitions get their own row next to their parent disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockDevice {
    pub name:        String,
    pub size:        u64,
    #[serde(rename = "type")]
    pub dev_type:    String,
    pub mount_point: Option<String>,
    pub fstype:      Option<String>,
    pub model:       Option<String>,
    pub serial:      Option<String>,
}

/// A device node as reported by lsblk, without its children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceNode {
    pub name:        String,
    pub size:        u64,
    pub dev_type:    String,
    pub mount_point: Option<String>,
    pub fstype:      Option<String>,
    pub model:       Option<String>,
    pub serial:      Option<String>,
}

/// The lsblk device hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceTree {
    Leaf(DeviceNode),
    Branch(DeviceNode, Vec<DeviceTree>),
}

impl DeviceTree {
    pub fn node(&self) -> &DeviceNode {
        match self {
            DeviceTree::Leaf(n) | DeviceTree::Branch(n, _) => n,
        }
    }
}

impl DeviceNode {
    /// Row for this node, named `name` (which may differ from the raw lsblk name).
    pub fn to_row(&self, name: String) -> BlockDevice {
        BlockDevice {
            name,
            size:        self.size,
            dev_type:    self.dev_type.clone(),
            mount_point: self.mount_point.clone(),
            fstype:      self.fstype.clone(),
            model:       self.model.clone(),
            serial:      self.serial.clone(),
        }
    }
}
