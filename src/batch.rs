use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tempfile::NamedTempFile;

use crate::banner::BannerImage;
use crate::config::CardConfig;
use crate::error::CardstockError;
use crate::font::FontResolver;
use crate::layout::layout_card;
use crate::pdf;
use crate::qr;
use crate::record::{MemberRecord, identifier_digest, identifier_suffix, sanitize_name};
use crate::render;
use crate::runlog::RunLogger;
use crate::summary::{RecordEntry, RunSummary};

#[derive(Clone, Default)]
pub struct BatchOptions {
    // 0 or 1 renders sequentially.
    pub workers: usize,
    // Also write a PNG preview next to each document.
    pub preview: bool,
    pub logger: Option<RunLogger>,
}

pub fn run_batch(
    records: &[MemberRecord],
    config: &CardConfig,
    banner: &BannerImage,
    output_dir: &Path,
) -> Result<RunSummary, CardstockError> {
    run_batch_with_options(records, config, banner, output_dir, &BatchOptions::default())
}

// Phase one walks records in input order and settles validity, first-wins
// identifier dedup, and collision-safe output names. Phase two renders the
// planned jobs, sequentially or on a worker pool, and merges entries back
// in input order. A packaging failure whose destination no longer accepts
// files marks the run aborted and stops dispatching; records never
// dispatched are absent from the summary.
pub fn run_batch_with_options(
    records: &[MemberRecord],
    config: &CardConfig,
    banner: &BannerImage,
    output_dir: &Path,
    options: &BatchOptions,
) -> Result<RunSummary, CardstockError> {
    config.validate()?;
    fs::create_dir_all(output_dir).map_err(|err| {
        CardstockError::Input(format!(
            "cannot create output directory {}: {err}",
            output_dir.display()
        ))
    })?;
    if !destination_usable(output_dir) {
        return Err(CardstockError::Input(format!(
            "output directory {} is not writable",
            output_dir.display()
        )));
    }

    let logger = options.logger.as_ref();
    if let Some(logger) = logger {
        logger.log(
            "run.start",
            &[
                ("records", &records.len().to_string()),
                ("output_dir", &output_dir.display().to_string()),
                ("workers", &options.workers.to_string()),
            ],
        );
    }

    let resolver = FontResolver::from_config(config);
    let ctx = RenderContext {
        records,
        config,
        banner,
        resolver: &resolver,
        output_dir,
        preview: options.preview,
        logger,
    };
    let plan = plan_records(records, output_dir);

    let mut summary = RunSummary::default();
    if options.workers > 1 {
        execute_parallel(&ctx, plan, options.workers, &mut summary)?;
    } else {
        execute_sequential(&ctx, plan, &mut summary);
    }

    if let Some(logger) = logger {
        logger.finish(&summary);
    }
    Ok(summary)
}

struct RenderContext<'a> {
    records: &'a [MemberRecord],
    config: &'a CardConfig,
    banner: &'a BannerImage,
    resolver: &'a FontResolver,
    output_dir: &'a Path,
    preview: bool,
    logger: Option<&'a RunLogger>,
}

enum PlanItem {
    // Settled during planning, no rendering needed.
    Resolved(RecordEntry),
    // Index into the input records plus the claimed destination.
    Job { record: usize, dest: PathBuf },
}

fn plan_records(records: &[MemberRecord], output_dir: &Path) -> Vec<PlanItem> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut claims: HashSet<String> = HashSet::new();
    let mut plan = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        if let Some(reason) = record.invalid_reason() {
            plan.push(PlanItem::Resolved(RecordEntry::invalid(
                &record.identifier,
                reason,
            )));
            continue;
        }
        if !seen.insert(record.identifier.as_str()) {
            plan.push(PlanItem::Resolved(RecordEntry::duplicate(&record.identifier)));
            continue;
        }
        let stem = claim_stem(&mut claims, record);
        plan.push(PlanItem::Job {
            record: index,
            dest: output_dir.join(format!("{stem}.pdf")),
        });
    }
    plan
}

// On a stem collision, append the short identifier digest; on a second
// collision, the full digest.
fn claim_stem(claims: &mut HashSet<String>, record: &MemberRecord) -> String {
    let base = sanitize_name(&record.name);
    let mut candidate = base.clone();
    if claims.contains(&candidate) {
        candidate = format!("{base}-{}", identifier_suffix(&record.identifier));
    }
    if claims.contains(&candidate) {
        candidate = format!("{base}-{}", identifier_digest(&record.identifier));
    }
    claims.insert(candidate.clone());
    candidate
}

fn execute_sequential(ctx: &RenderContext, plan: Vec<PlanItem>, summary: &mut RunSummary) {
    for item in plan {
        match item {
            PlanItem::Resolved(entry) => {
                log_entry(ctx.logger, &entry);
                summary.entries.push(entry);
            }
            PlanItem::Job { record, dest } => {
                if summary.aborted.is_some() {
                    continue;
                }
                let (entry, packaging_failed) = run_job(ctx, record, &dest);
                log_entry(ctx.logger, &entry);
                summary.entries.push(entry);
                if packaging_failed && !destination_usable(ctx.output_dir) {
                    summary.aborted = Some(abort_reason(ctx.output_dir));
                }
            }
        }
    }
}

// Render jobs run on the pool; every record got its summary slot during
// planning, so entries merge back in input order no matter which worker
// finished first.
fn execute_parallel(
    ctx: &RenderContext,
    plan: Vec<PlanItem>,
    workers: usize,
    summary: &mut RunSummary,
) -> Result<(), CardstockError> {
    use rayon::prelude::*;

    let mut slots: Vec<Option<RecordEntry>> = Vec::with_capacity(plan.len());
    let mut jobs: Vec<(usize, usize, PathBuf)> = Vec::new();
    for (slot, item) in plan.into_iter().enumerate() {
        match item {
            PlanItem::Resolved(entry) => {
                log_entry(ctx.logger, &entry);
                slots.push(Some(entry));
            }
            PlanItem::Job { record, dest } => {
                slots.push(None);
                jobs.push((slot, record, dest));
            }
        }
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|err| CardstockError::Input(format!("worker pool: {err}")))?;

    let stop = AtomicBool::new(false);
    let aborted: Mutex<Option<String>> = Mutex::new(None);
    let mut results: Vec<(usize, Option<RecordEntry>)> = pool.install(|| {
        jobs.par_iter()
            .map(|(slot, record, dest)| {
                if stop.load(Ordering::Relaxed) {
                    return (*slot, None);
                }
                let (entry, packaging_failed) = run_job(ctx, *record, dest);
                if packaging_failed && !destination_usable(ctx.output_dir) {
                    stop.store(true, Ordering::Relaxed);
                    if let Ok(mut reason) = aborted.lock() {
                        reason.get_or_insert_with(|| abort_reason(ctx.output_dir));
                    }
                }
                log_entry(ctx.logger, &entry);
                (*slot, Some(entry))
            })
            .collect()
    });
    results.sort_by_key(|(slot, _)| *slot);
    for (slot, entry) in results {
        slots[slot] = entry;
    }

    summary.entries.extend(slots.into_iter().flatten());
    summary.aborted = aborted.into_inner().unwrap_or(None);
    Ok(())
}

fn run_job(ctx: &RenderContext, record_index: usize, dest: &Path) -> (RecordEntry, bool) {
    let record = &ctx.records[record_index];
    match render_record(ctx, record, dest) {
        Ok(()) => (RecordEntry::rendered(&record.identifier, dest.to_path_buf()), false),
        Err(err) => {
            let packaging_failed = matches!(err, CardstockError::Packaging(_));
            (
                RecordEntry::failed(&record.identifier, err.to_string()),
                packaging_failed,
            )
        }
    }
}

fn render_record(
    ctx: &RenderContext,
    record: &MemberRecord,
    dest: &Path,
) -> Result<(), CardstockError> {
    let layout = layout_card(record, ctx.config, ctx.banner.aspect(), ctx.resolver);
    let qr = qr::encode(
        &record.identifier,
        layout.zones.qr.width,
        ctx.config.qr_quiet_modules,
    )?;
    let card = render::render(&layout, &qr, ctx.banner, ctx.config, ctx.resolver)?;
    pdf::package_card(&card, ctx.config.page, dest)?;
    if ctx.preview {
        let png = card.encode_png()?;
        fs::write(dest.with_extension("png"), png)
            .map_err(|err| CardstockError::Packaging(format!("preview write: {err}")))?;
    }
    Ok(())
}

fn log_entry(logger: Option<&RunLogger>, entry: &RecordEntry) {
    let Some(logger) = logger else { return };
    let event = format!("record.{}", entry.status.as_str());
    let output = entry.output.as_ref().map(|path| path.display().to_string());
    let mut fields: Vec<(&str, &str)> = vec![("identifier", entry.identifier.as_str())];
    if let Some(output) = output.as_deref() {
        fields.push(("output", output));
    }
    if let Some(detail) = entry.detail.as_deref() {
        fields.push(("detail", detail));
    }
    logger.log(&event, &fields);
}

// True when the directory exists and still accepts a new file.
fn destination_usable(dir: &Path) -> bool {
    dir.is_dir() && NamedTempFile::new_in(dir).is_ok()
}

fn abort_reason(dir: &Path) -> String {
    format!("output directory {} became unwritable", dir.display())
}
