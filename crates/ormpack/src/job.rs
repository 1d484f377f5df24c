//! One packing run: load the three sources, validate them, pack and write each
//! requested target, then refresh the ORM preview.
//!
//! Progress is expressed in "steps". Every requested target contributes two
//! steps (pack, write), so a run with both targets has four. While a target is
//! being packed the reported value interpolates inside its pack step using the
//! share of pixels processed so far.
//!
//! Reporting contract:
//!
//! - Nothing is reported when a source fails to load or the sizes disagree.
//! - Once reporting has started, values never decrease and the final call is
//!   exactly `1.0`, whether the run succeeds, fails to write, or is cancelled.
//! - A run with no targets reports a single `1.0` and writes nothing.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::buffer::{DimensionMismatch, GrayscaleBuffer, PackLayout};
use crate::pack::{check_dimensions, pack_layout};
use crate::preview::{PreviewSlot, PreviewStore};
use crate::source::{load_grayscale, DecodeError};
use crate::writer::{write_packed, WriteError};

pub const DEFAULT_UNREAL_OUTPUT: &str = "orm_unreal.png";
pub const DEFAULT_UNITY_OUTPUT: &str = "orm_unity.png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackingRequest {
    pub ao: PathBuf,
    pub roughness: PathBuf,
    pub metallic: PathBuf,
    pub unreal_output: PathBuf,
    pub unity_output: PathBuf,
    pub pack_unreal: bool,
    pub pack_unity: bool,
}

impl PackingRequest {
    /// Request for both targets written to the default file names.
    pub fn new(
        ao: impl Into<PathBuf>,
        roughness: impl Into<PathBuf>,
        metallic: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ao: ao.into(),
            roughness: roughness.into(),
            metallic: metallic.into(),
            unreal_output: PathBuf::from(DEFAULT_UNREAL_OUTPUT),
            unity_output: PathBuf::from(DEFAULT_UNITY_OUTPUT),
            pack_unreal: true,
            pack_unity: true,
        }
    }

    pub fn with_unreal_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.unreal_output = path.into();
        self
    }

    pub fn with_unity_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.unity_output = path.into();
        self
    }

    pub fn with_targets(mut self, unreal: bool, unity: bool) -> Self {
        self.pack_unreal = unreal;
        self.pack_unity = unity;
        self
    }

    /// Requested layouts in processing order.
    pub fn targets(&self) -> Vec<PackLayout> {
        PackLayout::ALL
            .into_iter()
            .filter(|layout| self.wants(*layout))
            .collect()
    }

    pub fn wants(&self, layout: PackLayout) -> bool {
        match layout {
            PackLayout::Unreal => self.pack_unreal,
            PackLayout::Unity => self.pack_unity,
        }
    }

    pub fn output_path(&self, layout: PackLayout) -> &Path {
        match layout {
            PackLayout::Unreal => &self.unreal_output,
            PackLayout::Unity => &self.unity_output,
        }
    }
}

#[derive(Debug, Error)]
pub enum PackingError {
    #[error("failed to load {channel} map: {source}")]
    Source {
        channel: &'static str,
        #[source]
        source: DecodeError,
    },

    #[error(transparent)]
    DimensionMismatch(#[from] DimensionMismatch),

    #[error("failed to write {layout} texture: {source}")]
    Write {
        layout: PackLayout,
        #[source]
        source: WriteError,
    },

    #[error("packing job was cancelled")]
    Cancelled,

    #[error("packing worker panicked")]
    WorkerPanicked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenOutput {
    pub layout: PackLayout,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedOutputs {
    pub width: u32,
    pub height: u32,
    pub written: Vec<WrittenOutput>,
    pub elapsed: Duration,
}

impl PackedOutputs {
    pub fn path_for(&self, layout: PackLayout) -> Option<&Path> {
        self.written
            .iter()
            .find(|output| output.layout == layout)
            .map(|output| output.path.as_path())
    }
}

/// Turns step and pixel progress into a non-decreasing fraction.
struct StepProgress<F: FnMut(f32)> {
    report: F,
    total: f32,
    completed: f32,
    last: f32,
}

impl<F: FnMut(f32)> StepProgress<F> {
    fn new(total_steps: usize, report: F) -> Self {
        Self {
            report,
            total: total_steps as f32,
            completed: 0.0,
            last: 0.0,
        }
    }

    fn within_step(&mut self, fraction: f32) {
        self.emit((self.completed + fraction) / self.total);
    }

    fn complete_step(&mut self) {
        self.completed += 1.0;
        self.emit(self.completed / self.total);
    }

    fn finish(mut self) {
        if self.last < 1.0 {
            (self.report)(1.0);
        }
    }

    fn emit(&mut self, value: f32) {
        let value = value.clamp(self.last, 1.0);
        self.last = value;
        (self.report)(value);
    }
}

pub struct PackingJob {
    request: PackingRequest,
    preview: Option<Arc<PreviewStore>>,
    cancel: Option<Arc<AtomicBool>>,
}

impl PackingJob {
    pub fn new(request: PackingRequest) -> Self {
        Self {
            request,
            preview: None,
            cancel: None,
        }
    }

    /// Refresh the ORM slot of `store` after the Unreal texture is written.
    pub fn with_preview(mut self, store: Arc<PreviewStore>) -> Self {
        self.preview = Some(store);
        self
    }

    /// Checked between steps; setting it stops the run before the next step.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn run(&self, on_progress: impl FnMut(f32)) -> Result<PackedOutputs, PackingError> {
        let started = Instant::now();
        let request = &self.request;

        let ao = load_source("ao", &request.ao)?;
        let roughness = load_source("roughness", &request.roughness)?;
        let metallic = load_source("metallic", &request.metallic)?;
        let (width, height) = check_dimensions(&ao, &roughness, &metallic).map_err(|err| {
            warn!(%err, "source maps disagree on size");
            err
        })?;

        let targets = request.targets();
        info!(
            width,
            height,
            targets = ?targets,
            "packing ORM textures"
        );

        let mut progress = StepProgress::new(targets.len() * 2, on_progress);
        let result = self.pack_targets(&targets, [&ao, &roughness, &metallic], &mut progress);
        progress.finish();

        let written = result?;
        let elapsed = started.elapsed();
        info!(
            outputs = written.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "ORM packing finished"
        );
        Ok(PackedOutputs {
            width,
            height,
            written,
            elapsed,
        })
    }

    fn pack_targets<F: FnMut(f32)>(
        &self,
        targets: &[PackLayout],
        [ao, roughness, metallic]: [&GrayscaleBuffer; 3],
        progress: &mut StepProgress<F>,
    ) -> Result<Vec<WrittenOutput>, PackingError> {
        let mut written = Vec::with_capacity(targets.len());
        for &layout in targets {
            self.checkpoint()?;
            let packed = pack_layout(layout, ao, roughness, metallic, |fraction| {
                progress.within_step(fraction)
            })?;
            progress.complete_step();
            debug!(%layout, "packed channels");

            self.checkpoint()?;
            let path = self.request.output_path(layout);
            write_packed(&packed, path).map_err(|source| {
                warn!(%layout, path = %path.display(), error = %source, "failed to write output");
                PackingError::Write { layout, source }
            })?;
            progress.complete_step();
            written.push(WrittenOutput {
                layout,
                path: path.to_path_buf(),
            });

            if layout == PackLayout::Unreal {
                if let Some(store) = &self.preview {
                    if let Err(error) = store.set_from_buffer(PreviewSlot::Orm, &packed, path) {
                        warn!(%error, "failed to refresh ORM preview");
                    }
                }
            }
        }
        Ok(written)
    }

    fn checkpoint(&self) -> Result<(), PackingError> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::SeqCst) => {
                info!("packing cancelled between steps");
                Err(PackingError::Cancelled)
            }
            _ => Ok(()),
        }
    }
}

fn load_source(channel: &'static str, path: &Path) -> Result<GrayscaleBuffer, PackingError> {
    load_grayscale(path).map_err(|source| {
        warn!(channel, path = %path.display(), error = %source, "failed to load source map");
        PackingError::Source { channel, source }
    })
}
