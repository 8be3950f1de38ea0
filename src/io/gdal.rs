use gdal::Dataset;
use gdal::errors::GdalError as GdalCrateError;
use gdal::raster::ResampleAlg;
use ndarray::Array2;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors raised while reading or writing rasters through GDAL
#[derive(Debug, Error)]
pub enum GdalError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] GdalCrateError),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Band {index} out of range (raster has {bands} bands)")]
    BandOutOfRange { index: usize, bands: usize },
    #[error("Dimension mismatch: expected {0}x{1}, got {2}x{3}")]
    DimensionMismatch(usize, usize, usize, usize),
}

/// Grid description of an opened raster
#[derive(Debug, Clone)]
pub struct GdalMetadata {
    /// Columns
    pub size_x: usize,
    /// Rows
    pub size_y: usize,
    pub bands: usize,
    /// `[origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height]`;
    /// identity when the file carries none
    pub geotransform: [f64; 6],
    /// WKT, empty when unknown
    pub projection: String,
}

impl GdalMetadata {
    pub fn is_north_up(&self) -> bool {
        self.geotransform[2] == 0.0 && self.geotransform[4] == 0.0
    }
}

/// Band reader over any GDAL raster (scene GeoTIFFs, Sentinel-2 JP2 bands)
pub struct GdalRasterReader {
    pub dataset: Dataset,
    pub metadata: GdalMetadata,
}

const IDENTITY: [f64; 6] = [0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

impl GdalRasterReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GdalError> {
        let path = path.as_ref();
        let dataset = Dataset::open(path)?;
        let bands = dataset.raster_count() as usize;
        if bands == 0 {
            return Err(GdalError::UnsupportedFormat(format!(
                "{} has no raster bands",
                path.display()
            )));
        }
        let (size_x, size_y) = dataset.raster_size();
        let metadata = GdalMetadata {
            size_x,
            size_y,
            bands,
            geotransform: dataset.geo_transform().unwrap_or(IDENTITY),
            projection: dataset.projection(),
        };
        debug!(
            "opened {} ({}x{}, {} bands)",
            path.display(),
            size_x,
            size_y,
            bands
        );
        Ok(Self { dataset, metadata })
    }

    fn band(&self, index: usize) -> Result<gdal::raster::RasterBand<'_>, GdalError> {
        if index == 0 || index > self.metadata.bands {
            return Err(GdalError::BandOutOfRange {
                index,
                bands: self.metadata.bands,
            });
        }
        Ok(self.dataset.rasterband(index)?)
    }

    /// Band `index` (1-based) at native resolution, shaped (rows, cols)
    pub fn read_band(&self, index: usize) -> Result<Array2<f64>, GdalError> {
        self.read_band_resampled(index, (self.metadata.size_x, self.metadata.size_y), None)
    }

    /// Whole band `index` resampled to `(cols, rows)`
    pub fn read_band_resampled(
        &self,
        index: usize,
        (cols, rows): (usize, usize),
        alg: Option<ResampleAlg>,
    ) -> Result<Array2<f64>, GdalError> {
        let band = self.band(index)?;
        let window = (self.metadata.size_x, self.metadata.size_y);
        let buf = band.read_as::<f64>((0, 0), window, (cols, rows), alg)?;
        let (got_cols, got_rows) = buf.shape();
        Array2::from_shape_vec((rows, cols), buf.data().to_vec())
            .map_err(|_| GdalError::DimensionMismatch(cols, rows, got_cols, got_rows))
    }

    /// Nodata value of band `index`, if set
    pub fn no_data_value(&self, index: usize) -> Result<Option<f64>, GdalError> {
        Ok(self.band(index)?.no_data_value())
    }
}
