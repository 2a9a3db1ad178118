//! Contents-event dispatch
//!
//! The host process emits structured events describing what its contents
//! layer just did; the dispatcher routes each one to the matching manager
//! operation. Unknown actions are ignored so the host can grow its event
//! vocabulary without breaking older stores.

use crate::{error::Result, manager::FileIdManager};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// A contents event as delivered by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentsEvent {
    pub action: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
}

/// The contents-event actions the dispatcher understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Get,
    Save,
    Rename,
    Copy,
    Delete,
}

impl FileAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "get" => Some(FileAction::Get),
            "save" => Some(FileAction::Save),
            "rename" => Some(FileAction::Rename),
            "copy" => Some(FileAction::Copy),
            "delete" => Some(FileAction::Delete),
            _ => None,
        }
    }

    /// Returns the wire identifier for the action.
    pub fn kind(&self) -> &'static str {
        match self {
            FileAction::Get => "get",
            FileAction::Save => "save",
            FileAction::Rename => "rename",
            FileAction::Copy => "copy",
            FileAction::Delete => "delete",
        }
    }
}

/// Routes contents events onto a file ID manager.
pub struct ActionDispatcher {
    manager: Arc<dyn FileIdManager>,
}

impl ActionDispatcher {
    pub fn new(manager: Arc<dyn FileIdManager>) -> Self {
        Self { manager }
    }

    /// Apply one event. Reads (`get`) and unknown actions are no-ops; a
    /// path-keyed manager additionally treats `save` as a no-op through its
    /// own `save` implementation.
    pub async fn dispatch(&self, event: &ContentsEvent) -> Result<()> {
        let Some(action) = FileAction::parse(&event.action) else {
            debug!("Ignoring unknown contents event action: {}", event.action);
            return Ok(());
        };

        match action {
            FileAction::Get => {}
            FileAction::Save => {
                self.manager.save(&event.path).await?;
            }
            FileAction::Rename => {
                if let Some(source_path) = &event.source_path {
                    self.manager.rename(source_path, &event.path).await?;
                }
            }
            FileAction::Copy => {
                if let Some(source_path) = &event.source_path {
                    self.manager.copy(source_path, &event.path).await?;
                }
            }
            FileAction::Delete => {
                self.manager.delete(&event.path).await?;
            }
        }

        Ok(())
    }
}
