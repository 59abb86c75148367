// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! IBus input-method table extraction (C5): reads `.db` SQLite tables
//! under `usr/share/ibus-table/tables/` for metadata IBus itself doesn't
//! expose through its component XML.

use std::path::Path;

use rusqlite::Connection;

use crate::{
    app::{App, AppKind},
    error::PluginError,
    package::{Package, PackageId, PackageOps},
};

use super::Plugin;

pub struct ImeSqlitePlugin;

fn read_table_metadata(db_path: &Path) -> rusqlite::Result<Option<(String, String)>> {
    let conn = Connection::open(db_path)?;
    let mut stmt = match conn.prepare("SELECT name, value FROM ime WHERE name IN ('name', 'symbol')") {
        Ok(stmt) => stmt,
        Err(_) => return Ok(None),
    };
    let mut name = None;
    let mut symbol = None;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (key, value) = row?;
        match key.as_str() {
            "name" => name = Some(value),
            "symbol" => symbol = Some(value),
            _ => {}
        }
    }
    Ok(name.zip(symbol))
}

impl Plugin for ImeSqlitePlugin {
    fn name(&self) -> &'static str {
        "ime_sqlite"
    }

    fn extract(
        &self,
        pkg_id: PackageId,
        package: &Package,
        root: &Path,
    ) -> std::result::Result<Vec<App>, PluginError> {
        let tables_dir = root.join("usr/share/ibus-table/tables");
        if !tables_dir.is_dir() {
            return Err(PluginError::NotSupported);
        }

        let mut apps = Vec::new();
        for entry in walkdir::WalkDir::new(&tables_dir)
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("db") {
                continue;
            }
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| PluginError::Failed("non-UTF8 table file name".into()))?;

            let id = format!("ibus-table-{stem}.inputmethod");
            let mut app = App::new(id, AppKind::InputMethod, pkg_id);
            app.pkgnames.push(package.nevr().name.clone());

            match read_table_metadata(path) {
                Ok(Some((name, symbol))) => {
                    app.names.insert("C".into(), name);
                    app.metadata.insert("X-IBusSymbol".into(), symbol);
                }
                Ok(None) => {
                    app.names.insert("C".into(), stem.to_string());
                }
                Err(e) => {
                    app.add_veto(format!("failed to read ibus table: {e}"));
                }
            }

            apps.push(app);
        }

        if apps.is_empty() {
            return Err(PluginError::NotSupported);
        }
        Ok(apps)
    }
}
