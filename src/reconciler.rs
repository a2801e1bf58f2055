//! Brings one group in line with a create/modify/delete request.
//!
//! Each call performs at most one structural change and saves the store once.

use serde::Serialize;

use crate::error::{GroupError, Result};
use crate::group::{DEFAULT_ICON_ID, DEFAULT_NOTES, Group, GroupReport};
use crate::params::{Action, GroupRequest};
use crate::store::CredentialStore;

/// Result of looking up a group that must be unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupMatch {
    Unique(Group),
    None,
    Ambiguous(usize),
}

impl GroupMatch {
    pub fn lookup<S: CredentialStore + ?Sized>(store: &S, name: &str) -> Self {
        let mut found = store.find_groups(name, false);
        match found.len() {
            0 => GroupMatch::None,
            1 => GroupMatch::Unique(found.remove(0)),
            n => GroupMatch::Ambiguous(n),
        }
    }

    /// The sole match, or the error for zero or many.
    pub fn into_unique(self, name: &str) -> Result<Group> {
        match self {
            GroupMatch::Unique(group) => Ok(group),
            GroupMatch::None => Err(GroupError::not_found(format!(
                "No group found in Database (looked for '{}')",
                name
            ))),
            GroupMatch::Ambiguous(count) => Err(GroupError::AmbiguousMatch {
                name: name.to_string(),
                count,
            }),
        }
    }
}

/// What an invocation reports back to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub changed: bool,
    #[serde(flatten)]
    pub group: Option<GroupReport>,
}

impl Outcome {
    fn changed(group: Option<GroupReport>) -> Self {
        Self { changed: true, group }
    }

    fn unchanged(group: GroupReport) -> Self {
        Self {
            changed: false,
            group: Some(group),
        }
    }
}

pub struct Reconciler<'a, S: CredentialStore + ?Sized> {
    store: &'a mut S,
    check_mode: bool,
}

impl<'a, S: CredentialStore + ?Sized> Reconciler<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self {
            store,
            check_mode: false,
        }
    }

    /// In check mode `create` reports what it would do without writing.
    /// `modify` and `delete` do not consult this flag.
    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    /// Dispatches on the raw action text.
    pub fn apply(&mut self, action: &str, request: &GroupRequest) -> Result<Outcome> {
        match Action::parse(action) {
            Some(Action::Create) => self.create(request),
            Some(Action::Modify) => self.modify(request),
            Some(Action::Delete) => self.delete(request),
            None => Err(GroupError::configuration("No action matched")),
        }
    }

    pub fn create(&mut self, request: &GroupRequest) -> Result<Outcome> {
        if let Some(existing) = self.first_match(&request.name) {
            log::info!("Group '{}' already exists, nothing to do", request.name);
            return Ok(Outcome::unchanged(existing.report()));
        }

        let icon_id = request.icon_id.as_deref().unwrap_or(DEFAULT_ICON_ID);
        let notes = request.notes.as_deref().unwrap_or(DEFAULT_NOTES);

        if self.check_mode {
            log::info!("Check mode: would create group '{}'", request.name);
            return Ok(Outcome::changed(Some(GroupReport {
                name: request.name.clone(),
                icon_id: icon_id.to_string(),
                notes: notes.to_string(),
            })));
        }

        self.store
            .add_group(&request.name, icon_id, notes)
            .and_then(|_| self.store.save())
            .map_err(|e| {
                GroupError::persistence_caused_by("Could not add the group or save the database.", e)
            })?;

        let created = self.first_match(&request.name).ok_or_else(|| {
            GroupError::persistence(format!(
                "Group '{}' is missing after it was added.",
                request.name
            ))
        })?;
        log::info!("Created group '{}'", created.name);
        Ok(Outcome::changed(Some(created.report())))
    }

    /// Applies the supplied fields to the single group named `request.name`.
    ///
    /// Reports `changed` even when the new values equal the old ones.
    pub fn modify(&mut self, request: &GroupRequest) -> Result<Outcome> {
        let target = GroupMatch::lookup(&*self.store, &request.name).into_unique(&request.name)?;
        self.warn_check_mode_ignored(Action::Modify);

        let group = self.store.group_mut(&target.uuid).ok_or_else(|| {
            GroupError::not_found(format!("No group found in Database (looked for '{}')", request.name))
        })?;
        if let Some(notes) = &request.notes {
            group.notes = notes.clone();
        }
        if let Some(icon_id) = &request.icon_id {
            group.icon_id = icon_id.clone();
        }
        if let Some(new_name) = &request.new_name {
            group.name = new_name.clone();
        }
        let report = group.report();

        self.store.save()?;
        log::info!("Modified group '{}' (now '{}')", request.name, report.name);
        Ok(Outcome::changed(Some(report)))
    }

    pub fn delete(&mut self, request: &GroupRequest) -> Result<Outcome> {
        let target = GroupMatch::lookup(&*self.store, &request.name).into_unique(&request.name)?;
        self.warn_check_mode_ignored(Action::Delete);

        self.store.delete_group(&target.uuid)?;
        self.store.save()?;
        log::info!("Deleted group '{}'", request.name);
        Ok(Outcome::changed(None))
    }

    fn first_match(&self, name: &str) -> Option<Group> {
        self.store
            .find_groups(name, true)
            .into_iter()
            .find(|g| g.name == name)
    }

    fn warn_check_mode_ignored(&self, action: Action) {
        if self.check_mode {
            log::warn!("Check mode is not honored by '{}'; the database is written", action);
        }
    }
}
