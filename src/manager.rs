use crate::analysis::{Params, analyze};
use crate::config::Config;
use crate::dataset::Dataset;
use crate::report::Report;
use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub struct Manager {
    data_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(data_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { data_dir, cfg })
    }

    pub fn inspect_data(&self) -> Result<()> {
        let (dataset, params) = self.load_data().context("failed to load data")?;

        log::info!(
            "time axis: {} points from {} to {}",
            dataset.n_rows(),
            dataset.timings()[0],
            dataset.timings()[dataset.n_rows() - 1]
        );
        log::info!("groups: {}", dataset.groups().len());
        log::info!("baseline rows: {:?}", params.baseline.range());
        log::info!("comparison rows: {:?}", params.comparison.range());

        Ok(())
    }

    pub fn analyze_data(&self) -> Result<()> {
        let (dataset, params) = self.load_data().context("failed to load data")?;

        let analysis = analyze(&dataset, &params).context("failed to analyze data")?;

        let report = Report::new(dataset.timings(), analysis);
        report.log_summary();

        let results_file = self.results_file();
        report
            .save(&results_file)
            .context("failed to save results")?;
        log::info!("saved {results_file:?}");

        Ok(())
    }

    pub fn clean_data(&self) -> Result<()> {
        let results_file = self.results_file();
        if results_file.exists() {
            fs::remove_file(&results_file)
                .with_context(|| format!("failed to remove {results_file:?}"))?;
            log::info!("removed {results_file:?}");
        }
        Ok(())
    }

    fn load_data(&self) -> Result<(Dataset, Params)> {
        let dataset = Dataset::from_dir(&self.data_dir).context("failed to load dataset")?;
        let params = Params::new(&self.cfg, &dataset).context("failed to construct params")?;
        Ok((dataset, params))
    }

    fn results_file(&self) -> PathBuf {
        self.data_dir.join("results.msgpack")
    }
}
