//! Group tree held inside a container.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_ICON_ID: &str = "48";
pub const DEFAULT_NOTES: &str = "Generated by ansible.";
pub const ROOT_GROUP_NAME: &str = "Root";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub uuid: Uuid,
    pub name: String,
    pub icon_id: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub groups: Vec<Group>,
}

impl Group {
    pub fn new(name: impl Into<String>, icon_id: impl Into<String>, notes: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            icon_id: icon_id.into(),
            notes: notes.into(),
            groups: Vec::new(),
        }
    }

    pub fn root() -> Self {
        Self::new(ROOT_GROUP_NAME, DEFAULT_ICON_ID, "")
    }

    /// Descendants in depth-first pre-order, excluding `self`.
    pub fn descendants(&self) -> Vec<&Group> {
        let mut out = Vec::new();
        for child in &self.groups {
            out.push(child);
            out.extend(child.descendants());
        }
        out
    }

    /// Descendants paired with their depth below `self` (children are depth 0).
    pub fn walk(&self) -> Vec<(usize, &Group)> {
        fn visit<'a>(group: &'a Group, depth: usize, out: &mut Vec<(usize, &'a Group)>) {
            for child in &group.groups {
                out.push((depth, child));
                visit(child, depth + 1, out);
            }
        }
        let mut out = Vec::new();
        visit(self, 0, &mut out);
        out
    }

    pub fn find_mut(&mut self, uuid: &Uuid) -> Option<&mut Group> {
        for child in &mut self.groups {
            if child.uuid == *uuid {
                return Some(child);
            }
            if let Some(found) = child.find_mut(uuid) {
                return Some(found);
            }
        }
        None
    }

    /// Detaches the descendant with `uuid`, together with its subtree.
    pub fn remove(&mut self, uuid: &Uuid) -> Option<Group> {
        if let Some(pos) = self.groups.iter().position(|g| g.uuid == *uuid) {
            return Some(self.groups.remove(pos));
        }
        self.groups.iter_mut().find_map(|child| child.remove(uuid))
    }

    pub fn report(&self) -> GroupReport {
        GroupReport {
            name: self.name.clone(),
            icon_id: self.icon_id.clone(),
            notes: self.notes.clone(),
        }
    }
}

/// The attributes reported back to the host for a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupReport {
    pub name: String,
    pub icon_id: String,
    pub notes: String,
}
