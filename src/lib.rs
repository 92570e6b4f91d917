pub mod error;
pub mod params;

pub mod classify;
pub mod evidence;
pub mod merge;
pub mod output;
pub mod paf;
pub mod qc;
pub mod region;
pub mod sample;
pub mod select;

use std::path::Path;

use log::{error, info, warn};
use rayon::prelude::*;

use crate::error::Error;
use crate::params::{ClassifyConfig, Parameters, RunMode};
use crate::region::RegionIndex;
use crate::sample::SampleReport;

/// Top-level dispatcher. Called from `main()` after CLI parsing.
pub fn run(params: &Parameters) -> anyhow::Result<()> {
    params.validate()?;

    info!("numtcheck v{}", env!("CARGO_PKG_VERSION"));
    info!("run mode: {}", params.run_mode);
    info!("type: {}", params.insert_type);

    match params.run_mode {
        RunMode::Classify => run_classify(params),
        RunMode::Merge => run_merge(params),
    }
}

fn run_classify(params: &Parameters) -> anyhow::Result<()> {
    let (Some(paf_dir), Some(mapping_csv)) = (&params.paf_dir, &params.position_mapping_csv) else {
        anyhow::bail!("classify mode needs --paf-dir and --position-mapping-csv");
    };
    info!("threads: {}", params.threads);
    info!("paf dir: {}", paf_dir.display());
    info!("position mapping: {}", mapping_csv.display());

    let index = RegionIndex::load(mapping_csv)?;
    info!(
        "Loaded {} regions for {} samples",
        index.len(),
        index.n_samples()
    );
    if index.is_empty() {
        warn!("{} has no region rows; every region table will be empty", mapping_csv.display());
    }

    let keep = params.sample_filter();
    let paf_paths = sample::discover_paf_files(paf_dir, params.insert_type, keep.as_ref())?;
    info!("Found {} PAF files", paf_paths.len());

    let config = params.classify_config();
    let type_dir = params.out_dir.join(params.insert_type.as_str());
    output::ensure_dir(&type_dir)?;

    let reports = classify_batch(&paf_paths, &index, &config, &type_dir, params.threads)?;

    let total = reports.len();
    let (done, failed): (Vec<_>, Vec<_>) = reports.into_iter().partition(Result::is_ok);
    let done: Vec<SampleReport> = done.into_iter().filter_map(Result::ok).collect();

    if !params.no_combined {
        write_combined(&type_dir, &done)?;
    }

    if !failed.is_empty() {
        return Err(Error::SampleFailures {
            failed: failed.len(),
            total,
        }
        .into());
    }

    info!("Classification complete!");
    Ok(())
}

/// Classify and write every sample on a dedicated pool.
///
/// Results come back in the order of `paf_paths`; a failed sample is logged
/// and does not stop the others.
pub fn classify_batch(
    paf_paths: &[std::path::PathBuf],
    index: &RegionIndex,
    config: &ClassifyConfig,
    type_dir: &Path,
    threads: usize,
) -> Result<Vec<Result<SampleReport, Error>>, Error> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| Error::Parameter(format!("failed to initialize thread pool: {e}")))?;

    let results = pool.install(|| {
        paf_paths
            .par_iter()
            .map(|path| -> Result<SampleReport, Error> {
                let report = sample::classify_sample(path, index, config)?;
                report.write(&type_dir.join(&report.sample), config.write_read_details)?;
                Ok(report)
            })
            .collect::<Vec<Result<SampleReport, Error>>>()
    });

    for (path, result) in paf_paths.iter().zip(&results) {
        if let Err(e) = result {
            error!("sample {} failed: {}", path.display(), e);
        }
    }

    Ok(results)
}

/// Combined region table (only if any rows) and combined QC list.
fn write_combined(type_dir: &Path, reports: &[SampleReport]) -> Result<(), Error> {
    let rows: Vec<&str> = reports
        .iter()
        .flat_map(|r| r.region_rows.iter().map(String::as_str))
        .collect();
    if !rows.is_empty() {
        output::write_tsv(
            &type_dir.join(output::COMBINED_REGION_TABLE_NAME),
            &output::REGION_HEADER,
            rows.as_slice(),
        )?;
    }

    let qc: Vec<&qc::QcSummary> = reports.iter().map(|r| &r.qc).collect();
    output::write_qc_list(&type_dir.join(output::COMBINED_QC_NAME), qc.as_slice())?;
    Ok(())
}

fn run_merge(params: &Parameters) -> anyhow::Result<()> {
    info!("out dir: {}", params.out_dir.display());
    let summary = merge::merge_reports(&params.out_dir, params.insert_type, &params.sample_list())?;
    info!(
        "Merge complete! {} tables, {} QC files, {} rows",
        summary.region_tables, summary.qc_files, summary.rows
    );
    Ok(())
}
