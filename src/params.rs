//! Module options as handed over by the host, and their validation.

use serde::{Deserialize, Deserializer, de};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::{GroupError, Result};
use crate::secret::SensitiveString;
use crate::store::Credentials;

/// Prefix of the option names the host reserves for itself.
const HOST_OPTION_PREFIX: &str = "_ansible_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Modify,
    Delete,
}

impl Action {
    /// Case-insensitive parse; `None` for anything that is not an action.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "create" => Some(Action::Create),
            "modify" => Some(Action::Modify),
            "delete" => Some(Action::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Modify => write!(f, "modify"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

/// Options recognized by the module.
///
/// Empty optional strings count as not supplied.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleArgs {
    pub database: PathBuf,
    #[serde(deserialize_with = "text")]
    pub name: String,
    pub action: String,
    #[serde(default, deserialize_with = "optional_path")]
    pub keyfile: Option<PathBuf>,
    #[serde(default)]
    pub database_password: Option<SensitiveString>,
    #[serde(default, deserialize_with = "optional_text")]
    pub icon_id: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub new_name: Option<String>,
    #[serde(default, rename = "_ansible_check_mode")]
    pub check_mode: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Text of a string or number option. The host declares every option as a
/// string, but playbooks hand over `name: 2024` or `icon_id: 48` unquoted.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    scalar_text(&value).ok_or_else(|| de::Error::custom("expected a string or a number"))
}

fn optional_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => scalar_text(&value)
            .map(Some)
            .ok_or_else(|| de::Error::custom("expected a string or a number")),
    }
}

fn optional_path<'de, D>(deserializer: D) -> std::result::Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    optional_text(deserializer).map(|text| text.map(PathBuf::from))
}

impl ModuleArgs {
    /// Parses the host's JSON options. Error messages never carry the password.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).map_err(|e| {
            GroupError::configuration(format!("Invalid module arguments: {}", e))
        })?;
        let password = value
            .get("database_password")
            .and_then(scalar_text)
            .map(SensitiveString::new);
        let args = ModuleArgs::deserialize(value).map_err(|e| {
            let message = format!("Invalid module arguments: {}", e);
            GroupError::configuration(match &password {
                Some(password) => password.redact(&message),
                None => message,
            })
        })?;
        Ok(args.normalized())
    }

    fn normalized(mut self) -> Self {
        self.keyfile = self.keyfile.filter(|p| !p.as_os_str().is_empty());
        self.database_password = self.database_password.filter(|p| !p.is_empty());
        self.icon_id = self.icon_id.filter(|s| !s.is_empty());
        self.notes = self.notes.filter(|s| !s.is_empty());
        self.new_name = self.new_name.filter(|s| !s.is_empty());
        self
    }

    /// Rejects invalid option combinations before the store is touched.
    pub fn validate(&self) -> Result<()> {
        let unsupported: Vec<&str> = self
            .extra
            .keys()
            .map(String::as_str)
            .filter(|key| !key.starts_with(HOST_OPTION_PREFIX))
            .collect();
        if !unsupported.is_empty() {
            return Err(GroupError::configuration(format!(
                "Unsupported parameters for (passgroup) module: {}",
                unsupported.join(", ")
            )));
        }

        if self.name.is_empty() {
            return Err(GroupError::configuration("'name' must not be empty."));
        }

        let action = self.action.to_ascii_lowercase();
        if (action == "create" || action == "delete") && self.new_name.is_some() {
            return Err(GroupError::configuration(
                "Action 'Create' or 'Delete' do not take 'new_name'",
            ));
        }

        if self.database_password.is_none() && self.keyfile.is_none() {
            return Err(GroupError::configuration(
                "Either 'database_password' or 'keyfile' (or both) are required.",
            ));
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.database_password.clone(), self.keyfile.clone())
    }

    /// What the reconciler needs once the store is open.
    pub fn request(&self) -> GroupRequest {
        GroupRequest {
            name: self.name.clone(),
            icon_id: self.icon_id.clone(),
            notes: self.notes.clone(),
            new_name: self.new_name.clone(),
        }
    }
}

/// The group-level part of an invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupRequest {
    pub name: String,
    pub icon_id: Option<String>,
    pub notes: Option<String>,
    pub new_name: Option<String>,
}

impl GroupRequest {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}
