//! Dataset Module
//!
//! Entry point that ties the archive, the cube engine and a payload codec
//! together: open a file, group its records into variables, read labeled
//! blocks, and write the whole dataset back out.
//!
//! ## Responsibilities
//! - Open and index the archive once, then share it by `Arc`
//! - Group records with the configured name scheme and filters
//! - Serve block reads through the configured codec and worker count
//! - Write every variable back through `write_block`

use std::path::Path;
use std::sync::Arc;

use ndarray::{ArrayD, Axis};
use tracing::info;

use crate::archive::{Archive, ArchiveWriter, Layout, OpenMode, StationList, WriteSummary};
use crate::codec::{PayloadCodec, ScaledIntegerCodec};
use crate::config::Config;
use crate::cube::{
    group, read_block, write_block, AxisName, AxisSelector, AxisValue, Cube, GeometryInfo,
    Grouping, VariableGroup, WriteBlock,
};
use crate::error::{Result, TdlpackError};

/// A labeled, lazily loaded view over one archive
///
/// Every variable shares one [`Cube`]; opening fails if the records cannot
/// be arranged that way, and the caller is expected to narrow with filters.
pub struct Dataset {
    /// Dataset configuration
    config: Config,

    /// Indexed archive shared with every variable
    archive: Arc<Archive>,

    /// Codec used to unpack and pack record payloads
    codec: Arc<dyn PayloadCodec>,

    /// Variables, shared cube and geometry
    grouping: Grouping,
}

impl Dataset {
    /// Open an archive and assemble it with the reference codec
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let archive = Arc::new(Archive::open_with_config(path, config)?);
        Self::from_archive(archive, config)
    }

    /// Assemble an already opened archive
    pub fn from_archive(archive: Arc<Archive>, config: &Config) -> Result<Self> {
        let grouping = group(&archive, &config.name_scheme, &config.filters)?;
        info!(
            path = %archive.path().display(),
            variables = grouping.groups.len(),
            shape = ?grouping.cube.shape(),
            "Assembled dataset"
        );
        Ok(Self {
            config: config.clone(),
            archive,
            codec: Arc::new(ScaledIntegerCodec::new()),
            grouping,
        })
    }

    /// Use a different payload codec
    pub fn with_codec(mut self, codec: Arc<dyn PayloadCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn archive(&self) -> &Arc<Archive> {
        &self.archive
    }

    pub fn codec(&self) -> &Arc<dyn PayloadCodec> {
        &self.codec
    }

    pub fn is_empty(&self) -> bool {
        self.grouping.groups.is_empty()
    }

    /// Variable names, sorted
    pub fn variables(&self) -> Vec<&str> {
        self.grouping.groups.iter().map(VariableGroup::name).collect()
    }

    pub fn variable(&self, name: &str) -> Option<&VariableGroup> {
        self.grouping.groups.iter().find(|group| group.name() == name)
    }

    pub fn groups(&self) -> &[VariableGroup] {
        &self.grouping.groups
    }

    pub fn cube(&self) -> &Cube {
        &self.grouping.cube
    }

    pub fn geometry(&self) -> &GeometryInfo {
        &self.grouping.geometry
    }

    /// Read a block of one variable
    pub fn read(&self, name: &str, selectors: &[AxisSelector]) -> Result<ArrayD<f32>> {
        let group = self.variable(name).ok_or_else(|| {
            TdlpackError::validation(format!("no variable named '{}'", name))
        })?;
        read_block(group, selectors, self.codec.as_ref(), self.config.read_workers)
    }

    /// Write every variable to a new sequential archive.
    ///
    /// Station datasets get their station list first.
    pub fn write_to(&self, path: impl AsRef<Path>, mode: OpenMode) -> Result<WriteSummary> {
        let mut writer = ArchiveWriter::create(path, Layout::Sequential, mode, &self.config)?;

        if let GeometryInfo::Stations { stations, .. } = self.geometry() {
            writer.append_station_list(&StationList::new(stations.iter().cloned())?)?;
        }

        for group in &self.grouping.groups {
            let full = read_block(group, &[], self.codec.as_ref(), self.config.read_workers)?;
            let mut block = WriteBlock::from_group(group)?;
            block.primary_missing = self.config.primary_missing;
            block.secondary_missing = self.config.secondary_missing;

            let axes: Vec<AxisName> = group.axes().to_vec();
            let cube = group.cube();
            let provider = |coordinate: &[AxisValue]| -> Result<Vec<f32>> {
                let mut view = full.view();
                for (axis, value) in axes.iter().zip(coordinate) {
                    let pos = cube.position(*axis, value).ok_or_else(|| {
                        TdlpackError::validation(format!("{} is not on axis '{}'", value, axis))
                    })?;
                    view = view.index_axis_move(Axis(0), pos);
                }
                Ok(view.iter().copied().collect())
            };

            write_block(
                &mut writer,
                &block,
                provider,
                self.config.quantization,
                self.codec.as_ref(),
            )?;
        }

        writer.close()
    }
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("archive", &self.archive)
            .field("variables", &self.variables())
            .field("cube", &self.grouping.cube.shape())
            .finish()
    }
}
