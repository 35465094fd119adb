// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Template catalog backed by a directory tree.
//!
//! Layout is `<templates_dir>/<language>/<template>.zip`. A template has a
//! dedicated icon when `<icons_dir>/<template>.png` exists.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::types::Template;

const DEFAULT_ICON_CLASS: &str = "sprite-Large";

pub trait TemplateCatalog: Send + Sync {
	fn templates(&self) -> &[Template];

	fn find(&self, name: &str) -> Option<&Template> {
		self.templates().iter().find(|t| t.name == name)
	}
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryCatalog {
	templates: Vec<Template>,
}

impl DirectoryCatalog {
	/// Enumerate templates once. An unreadable tree yields an empty catalog.
	pub fn load(templates_dir: &Path, icons_dir: &Path) -> Self {
		match scan(templates_dir, icons_dir) {
			Ok(templates) => {
				debug!(
					dir = %templates_dir.display(),
					count = templates.len(),
					"loaded template catalog"
				);
				Self { templates }
			}
			Err(e) => {
				warn!(
					dir = %templates_dir.display(),
					error = %e,
					"failed to read template directory, catalog is empty"
				);
				Self::default()
			}
		}
	}

	pub fn from_templates(templates: Vec<Template>) -> Self {
		Self { templates }
	}
}

impl TemplateCatalog for DirectoryCatalog {
	fn templates(&self) -> &[Template] {
		&self.templates
	}
}

fn scan(templates_dir: &Path, icons_dir: &Path) -> io::Result<Vec<Template>> {
	let mut templates = Vec::new();
	for language_dir in sorted_entries(templates_dir)? {
		if !language_dir.is_dir() {
			continue;
		}
		let Some(language) = file_name(&language_dir) else {
			continue;
		};
		for package in sorted_entries(&language_dir)? {
			if !package.is_file() {
				continue;
			}
			let Some(name) = package.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
				continue;
			};
			let icon_class = icon_class(icons_dir, &name);
			templates.push(Template {
				name,
				language: language.clone(),
				package_path: package,
				icon_class: Some(icon_class),
			});
		}
	}
	Ok(templates)
}

fn sorted_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
	let mut entries = fs::read_dir(dir)?
		.map(|entry| entry.map(|e| e.path()))
		.collect::<io::Result<Vec<_>>>()?;
	entries.sort();
	Ok(entries)
}

fn file_name(path: &Path) -> Option<String> {
	path.file_name().and_then(|s| s.to_str()).map(str::to_string)
}

fn icon_class(icons_dir: &Path, name: &str) -> String {
	if icons_dir.join(format!("{name}.png")).is_file() {
		format!("sprite-{}", name.replace(' ', "").replace('#', "Sharp"))
	} else {
		DEFAULT_ICON_CLASS.to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn write(path: &Path) {
		fs::create_dir_all(path.parent().unwrap()).unwrap();
		fs::write(path, b"zip").unwrap();
	}

	#[test]
	fn enumerates_language_directories() {
		let root = TempDir::new().unwrap();
		let templates = root.path().join("templates");
		let icons = root.path().join("icons");
		write(&templates.join("CSharp/ASP.NET Empty Site.zip"));
		write(&templates.join("CSharp/C# Starter.zip"));
		write(&templates.join("Node/Express.zip"));
		write(&icons.join("C# Starter.png"));
		fs::create_dir_all(&icons).unwrap();

		let catalog = DirectoryCatalog::load(&templates, &icons);
		let names: Vec<_> = catalog.templates().iter().map(|t| t.name.as_str()).collect();
		assert_eq!(names, vec!["ASP.NET Empty Site", "C# Starter", "Express"]);

		let starter = catalog.find("C# Starter").unwrap();
		assert_eq!(starter.language, "CSharp");
		assert_eq!(starter.icon_class.as_deref(), Some("sprite-CSharpStarter"));
		assert_eq!(starter.package_path, templates.join("CSharp/C# Starter.zip"));

		let express = catalog.find("Express").unwrap();
		assert_eq!(express.icon_class.as_deref(), Some(DEFAULT_ICON_CLASS));
	}

	#[test]
	fn loose_files_at_root_are_ignored() {
		let root = TempDir::new().unwrap();
		write(&root.path().join("README.md"));
		write(&root.path().join("PHP/Basic.zip"));

		let catalog = DirectoryCatalog::load(root.path(), &root.path().join("icons"));
		assert_eq!(catalog.templates().len(), 1);
		assert_eq!(catalog.templates()[0].language, "PHP");
	}

	#[test]
	fn missing_directory_gives_empty_catalog() {
		let root = TempDir::new().unwrap();
		let catalog = DirectoryCatalog::load(&root.path().join("nope"), root.path());
		assert!(catalog.templates().is_empty());
		assert!(catalog.find("anything").is_none());
	}
}
