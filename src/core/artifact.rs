//! Artifact descriptors and on-disk materialization.
//!
//! A notebook lives at `notebooks/<name>.ipynb`; an app lives at
//! `apps/<name>/streamlit_app.py`. Created artifacts are the minimal valid
//! file of their kind; connected artifacts must already exist.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::utils::validation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactKind {
    Notebook,
    App,
}

impl ArtifactKind {
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::Notebook => "notebook",
            ArtifactKind::App => "app",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactMode {
    CreateNew,
    ConnectExisting,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDescriptor {
    pub kind: ArtifactKind,
    pub display_name: String,
    /// Path relative to the project directory.
    pub local_path: PathBuf,
    pub mode: ArtifactMode,
}

const EMPTY_NOTEBOOK: &str = r#"{
 "cells": [],
 "metadata": {},
 "nbformat": 4,
 "nbformat_minor": 5
}
"#;

impl ArtifactDescriptor {
    pub fn new(kind: ArtifactKind, name: &str, mode: ArtifactMode) -> Result<Self> {
        let name = validation::artifact_name(name)?;
        let local_path = match kind {
            ArtifactKind::Notebook => PathBuf::from("notebooks").join(format!("{}.ipynb", name)),
            ArtifactKind::App => PathBuf::from("apps").join(name).join("streamlit_app.py"),
        };
        Ok(Self {
            kind,
            display_name: name.to_string(),
            local_path,
            mode,
        })
    }

    /// Directory under the repository that holds this artifact's files,
    /// as referenced when registering it against a branch stage path.
    pub fn stage_directory(&self) -> String {
        match self.kind {
            ArtifactKind::Notebook => "notebooks".to_string(),
            ArtifactKind::App => format!("apps/{}", self.display_name),
        }
    }

    pub fn main_file(&self) -> String {
        match self.kind {
            ArtifactKind::Notebook => format!("{}.ipynb", self.display_name),
            ArtifactKind::App => "streamlit_app.py".to_string(),
        }
    }

    /// Create the artifact on disk, or verify it exists, per its mode.
    pub fn realize(&self, dir: &Path) -> Result<()> {
        let path = dir.join(&self.local_path);
        match self.mode {
            ArtifactMode::CreateNew => {
                if path.exists() {
                    return Err(Error::validation_invalid_argument(
                        "name",
                        format!(
                            "{} already exists; re-run in connect-existing mode to publish it",
                            self.local_path.display()
                        ),
                        Some(self.display_name.clone()),
                    ));
                }
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        Error::internal_io(e.to_string(), Some("create artifact directory".to_string()))
                    })?;
                }
                std::fs::write(&path, self.initial_content()).map_err(|e| {
                    Error::internal_io(e.to_string(), Some("write artifact".to_string()))
                })
            }
            ArtifactMode::ConnectExisting => {
                if path.exists() {
                    Ok(())
                } else {
                    Err(Error::validation_invalid_argument(
                        "name",
                        format!("{} does not exist", self.local_path.display()),
                        Some(self.display_name.clone()),
                    ))
                }
            }
        }
    }

    fn initial_content(&self) -> String {
        match self.kind {
            ArtifactKind::Notebook => EMPTY_NOTEBOOK.to_string(),
            ArtifactKind::App => format!(
                "import streamlit as st\n\nst.title(\"{}\")\n",
                self.display_name
            ),
        }
    }
}
