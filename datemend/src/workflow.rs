//! The interactive action loop.
//!
//! Ties the scanner, the scan cache, and the remediation engine together
//! behind a menu. Every action returns to the menu when it finishes, so a
//! session can scan, repair, and re-check without reconnecting.

use std::path::Path;

use colored::Colorize;
use sqlx::MySqlPool;
use tracing::{error, info, warn};

use datemend_core::models::{ColumnRecord, Inventory, TableSelection, unique_tables};
use datemend_core::{ConnectionSettings, Result, cache, remediation, scanner};

use crate::ui::{self, Gate, MenuState};

/// Rows shown per column when previewing a batch.
const PREVIEW_ROWS: u32 = 5;

/// One dispatchable unit of work, from the menu or `--action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Scan,
    Report,
    FixNulls,
    AllowNulls,
    ConvertTimestamps,
    Exit,
}

/// The three mutation batches share one selection-and-confirm driver;
/// this picks which engine call runs at the end of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RemediationKind {
    FixNulls,
    AllowNulls,
    ConvertTimestamps,
}

impl RemediationKind {
    fn title(self) -> &'static str {
        match self {
            Self::FixNulls => "Set zero-date rows to NULL",
            Self::AllowNulls => "Make NOT NULL date columns nullable",
            Self::ConvertTimestamps => "Convert TIMESTAMP columns to DATETIME",
        }
    }

    fn empty_message(self) -> &'static str {
        match self {
            Self::FixNulls => "no nullable columns hold zero dates",
            Self::AllowNulls => "every column with zero dates already accepts NULL",
            Self::ConvertTimestamps => "no TIMESTAMP columns in the inventory",
        }
    }

    /// ALTER batches get a second confirmation on top of the gate.
    fn is_alter(self) -> bool {
        !matches!(self, Self::FixNulls)
    }
}

struct Workflow<'a> {
    pool: &'a MySqlPool,
    settings: &'a ConnectionSettings,
    cache_file: &'a Path,
    inventory: Option<Inventory>,
}

/// Runs the interactive loop until the operator exits.
///
/// `initial_action` is consumed once before the first menu, so
/// `--action report` drops straight into the report and then behaves
/// like any other session.
pub async fn run(
    pool: &MySqlPool,
    settings: &ConnectionSettings,
    cache_file: &Path,
    inventory: Option<Inventory>,
    initial_action: Option<Action>,
) -> Result<()> {
    let mut workflow = Workflow {
        pool,
        settings,
        cache_file,
        inventory,
    };
    let mut pending = initial_action;

    loop {
        let action = match pending.take() {
            Some(action) => action,
            None => ui::main_menu(&MenuState::from_inventory(workflow.inventory.as_ref())),
        };

        match action {
            Action::Scan => workflow.scan().await?,
            Action::Report => workflow.report(),
            Action::FixNulls => workflow.remediate(RemediationKind::FixNulls).await?,
            Action::AllowNulls => workflow.remediate(RemediationKind::AllowNulls).await?,
            Action::ConvertTimestamps => {
                workflow.remediate(RemediationKind::ConvertTimestamps).await?;
            }
            Action::Exit => {
                info!("Exiting");
                return Ok(());
            }
        }
    }
}

impl Workflow<'_> {
    /// Full scan: pick schemas, enumerate date columns, count zero dates,
    /// then replace the inventory and the cache.
    async fn scan(&mut self) -> Result<()> {
        let sp = ui::spinner("Enumerating schemas...");
        let schemas = scanner::list_schemas(self.pool).await;
        sp.finish_and_clear();
        let schemas = schemas?;

        if schemas.is_empty() {
            eprintln!(
                "{}",
                "No accessible schemas on this server (system schemas are excluded).".red()
            );
            error!("No accessible schemas; nothing to scan");
            std::process::exit(1);
        }

        let selected = ui::multi_select("Schemas to scan:", &schemas);
        if selected.is_empty() {
            println!("{}", "No schemas selected; inventory unchanged.".yellow());
            return Ok(());
        }
        let chosen: Vec<String> = selected.iter().map(|&i| schemas[i].clone()).collect();

        let sp = ui::spinner("Enumerating date columns...");
        let metas = scanner::list_date_columns(self.pool, &chosen).await;
        sp.finish_and_clear();
        let metas = metas?;

        println!(
            "Counting zero dates in {} columns across {} schemas",
            metas.len(),
            chosen.len()
        );
        let pb = ui::count_progress(metas.len() as u64);
        let records = scanner::scan_columns(self.pool, metas, |record| {
            pb.set_message(format!("{}.{}", record.table, record.column));
            pb.inc(1);
        })
        .await;
        pb.finish_and_clear();

        let inventory = Inventory::new(chosen, records);
        println!(
            "{}",
            format!(
                "Scan complete: {} columns, {} with zero dates, {} bad rows",
                inventory.columns.len(),
                inventory.bad_column_count(),
                inventory.bad_row_total()
            )
            .green()
        );

        self.save_cache(&inventory).await;
        self.inventory = Some(inventory);
        Ok(())
    }

    fn report(&self) {
        match &self.inventory {
            Some(inventory) => ui::print_report(inventory),
            None => println!("{}", "No inventory yet. Run a scan first.".yellow()),
        }
    }

    /// Shared driver for the three mutation batches: candidate set, table
    /// scope, gate, confirmation, engine call, then targeted re-verify.
    async fn remediate(&mut self, kind: RemediationKind) -> Result<()> {
        let candidates: Vec<ColumnRecord> = match self.inventory.as_ref() {
            None => {
                println!("{}", "No inventory yet. Run a scan first.".yellow());
                return Ok(());
            }
            Some(inventory) => match kind {
                RemediationKind::FixNulls => inventory.fixable_columns(),
                RemediationKind::AllowNulls => inventory.not_null_bad_columns(),
                RemediationKind::ConvertTimestamps => inventory.convertible_columns(),
            }
            .into_iter()
            .cloned()
            .collect(),
        };

        if candidates.is_empty() {
            println!(
                "{}",
                format!("Nothing to do: {}.", kind.empty_message()).yellow()
            );
            return Ok(());
        }

        let tables = unique_tables(candidates.iter());
        let labels: Vec<String> = tables
            .iter()
            .map(|(schema, table)| {
                let in_table: Vec<&ColumnRecord> = candidates
                    .iter()
                    .filter(|c| &c.schema == schema && &c.table == table)
                    .collect();
                let bad: i64 = in_table
                    .iter()
                    .filter(|c| c.has_bad_rows())
                    .map(|c| c.bad_rows)
                    .sum();
                format!(
                    "{}.{} ({} columns, {} bad rows)",
                    schema,
                    table,
                    in_table.len(),
                    bad
                )
            })
            .collect();

        let selected = ui::multi_select(&format!("{}: tables in scope", kind.title()), &labels);
        if selected.is_empty() {
            // An empty scope is a decision the operator states out loud,
            // never a silent fall-through to everything or to nothing.
            if ui::confirm("No tables selected. Proceed with no changes?") {
                println!("No changes made.");
            } else {
                println!("Cancelled.");
            }
            return Ok(());
        }

        let selection = TableSelection::from_pairs(selected.iter().map(|&i| tables[i].clone()));
        let scoped: Vec<ColumnRecord> = selection
            .filter_columns(candidates.iter())
            .into_iter()
            .cloned()
            .collect();

        if kind == RemediationKind::FixNulls {
            let defaulted = scoped.iter().filter(|c| c.has_zero_default()).count();
            if defaulted > 0 {
                println!(
                    "{}",
                    format!(
                        "Warning: {defaulted} selected columns declare a zero-date DEFAULT. \
                         Fixed rows stay fixed, but new inserts will keep producing zero dates."
                    )
                    .yellow()
                );
            }
        }

        if kind == RemediationKind::ConvertTimestamps {
            let dirty = scoped.iter().filter(|c| c.has_bad_rows()).count();
            if dirty > 0 {
                println!(
                    "{}",
                    format!(
                        "Warning: {dirty} selected columns still hold zero dates. \
                         Converting keeps those values broken; consider fixing them first."
                    )
                    .yellow()
                );
            }
        }

        println!(
            "\n{} will touch {} columns in {} tables.",
            kind.title(),
            scoped.len(),
            selection.len()
        );
        loop {
            match ui::gate() {
                Gate::Proceed => break,
                Gate::Preview => self.preview(&scoped).await,
                Gate::Cancel => {
                    println!("Cancelled.");
                    return Ok(());
                }
            }
        }

        if kind.is_alter()
            && !ui::confirm(&format!(
                "{} runs ALTER TABLE on each table. Continue?",
                kind.title()
            ))
        {
            println!("Cancelled.");
            return Ok(());
        }

        let sp = ui::spinner("Applying changes...");
        let outcome = match kind {
            RemediationKind::FixNulls => remediation::fix_bad_rows(self.pool, &scoped).await,
            RemediationKind::AllowNulls => {
                remediation::allow_null_on_columns(self.pool, &scoped).await
            }
            RemediationKind::ConvertTimestamps => {
                remediation::convert_to_datetime(self.pool, &scoped).await
            }
        };
        sp.finish_and_clear();
        let outcome = outcome?;

        ui::print_outcome(&outcome, scoped.len());

        if !outcome.succeeded.is_empty() {
            let touched: Vec<ColumnRecord> = outcome
                .succeeded
                .iter()
                .map(|done| done.record.clone())
                .collect();
            self.refresh_columns(&touched).await;
            if let Some(inventory) = &self.inventory {
                self.save_cache(inventory).await;
            }
        }

        Ok(())
    }

    /// Samples zero-date rows for each dirty column in the batch.
    async fn preview(&self, columns: &[ColumnRecord]) {
        let dirty: Vec<&ColumnRecord> = columns.iter().filter(|c| c.has_bad_rows()).collect();
        if dirty.is_empty() {
            println!("No zero-date rows to preview in this selection.");
            return;
        }
        for column in dirty {
            let rows = scanner::sample_bad_rows(
                self.pool,
                &column.schema,
                &column.table,
                &column.column,
                PREVIEW_ROWS,
            )
            .await;
            ui::print_sample_rows(column, &rows);
        }
    }

    /// Re-verifies exactly the columns a batch touched and merges the
    /// fresh counts into the inventory. Never trusts the old numbers.
    async fn refresh_columns(&mut self, touched: &[ColumnRecord]) {
        let Some(inventory) = self.inventory.as_mut() else {
            return;
        };

        for record in touched {
            match scanner::rescan_column(self.pool, &record.schema, &record.table, &record.column)
                .await
            {
                Ok(refreshed) => {
                    if refreshed.is_none() {
                        warn!(
                            "Column {} disappeared after remediation",
                            record.qualified_name()
                        );
                    }
                    inventory.apply_rescan(&record.schema, &record.table, &record.column, refreshed);
                }
                Err(e) => {
                    warn!("Could not re-verify {}: {}", record.qualified_name(), e);
                    inventory.apply_rescan(&record.schema, &record.table, &record.column, None);
                }
            }
        }
    }

    async fn save_cache(&self, inventory: &Inventory) {
        if let Err(e) = cache::save(
            self.cache_file,
            &self.settings.host,
            self.settings.port,
            inventory,
        )
        .await
        {
            warn!("Could not save the scan cache: {e}");
        } else {
            info!("Scan cache written to {}", self.cache_file.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alter_kinds_need_extra_confirmation() {
        assert!(!RemediationKind::FixNulls.is_alter());
        assert!(RemediationKind::AllowNulls.is_alter());
        assert!(RemediationKind::ConvertTimestamps.is_alter());
    }

    #[test]
    fn test_kind_titles_name_the_operation() {
        assert_eq!(
            RemediationKind::FixNulls.title(),
            "Set zero-date rows to NULL"
        );
        assert_eq!(
            RemediationKind::ConvertTimestamps.title(),
            "Convert TIMESTAMP columns to DATETIME"
        );
    }
}
