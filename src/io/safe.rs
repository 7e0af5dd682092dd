use crate::types::{SarError, SarResult};
use crate::utils::timing::Timing;
use gdal::raster::{Buffer, RasterBand, RasterCreationOption};
use gdal::Dataset;
use gdal_sys::GDALDataType;
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// SAFE recompression parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressOptions {
    /// Smoothing cell size in pixels. Values above 1 replace each band by
    /// its RMS over `smooth x smooth` cells.
    pub smooth: usize,
    /// GDAL creation options for the rewritten measurement files
    pub creation_options: Vec<(String, String)>,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            smooth: 0,
            creation_options: vec![("COMPRESS".to_string(), "ZSTD".to_string())],
        }
    }
}

fn copy_dir(src: &Path, dst: &Path) -> SarResult<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn measurement_files(safe: &Path) -> SarResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(safe.join("measurement"))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().map_or(false, |ext| ext == "tiff"))
        .collect();
    files.sort();
    Ok(files)
}

/// Root mean square over non-overlapping `factor x factor` cells. Partial
/// cells at the right and bottom edges are dropped.
pub fn rms_reduce(band: &Array2<f64>, factor: usize) -> SarResult<Array2<f64>> {
    let (height, width) = band.dim();
    if factor == 0 || height / factor == 0 || width / factor == 0 {
        return Err(SarError::Processing(format!(
            "Smooth size {} too large for {}x{} band",
            factor, height, width
        )));
    }

    let reduced = Array2::from_shape_fn((height / factor, width / factor), |(i, j)| {
        let cell = band.slice(s![i * factor..(i + 1) * factor, j * factor..(j + 1) * factor]);
        (cell.mapv(|v| v * v).sum() / cell.len() as f64).sqrt()
    });
    Ok(reduced)
}

/// Nearest-neighbour expansion of a reduced band back to `(height, width)`.
/// Reduced cell `i` sits at pixel `i * factor + factor / 2`; pixels beyond
/// the last cell take the edge value.
pub fn nearest_expand(reduced: &Array2<f64>, factor: usize, (height, width): (usize, usize)) -> Array2<f64> {
    let (rows, cols) = reduced.dim();
    let nearest = |pixel: usize, cells: usize| -> usize {
        let centre = factor as f64 / 2.0;
        let index = ((pixel as f64 - centre) / factor as f64).round();
        (index.max(0.0) as usize).min(cells.saturating_sub(1))
    };
    Array2::from_shape_fn((height, width), |(i, j)| reduced[[nearest(i, rows), nearest(j, cols)]])
}

/// Smoothing works on real samples only. Reading a complex band as `f64`
/// keeps the real part and would drop the imaginary one on write.
fn ensure_real_band(data_type: GDALDataType::Type) -> SarResult<()> {
    let complex = unsafe { gdal_sys::GDALDataTypeIsComplex(data_type) } != 0;
    if complex {
        let name = unsafe { std::ffi::CStr::from_ptr(gdal_sys::GDALGetDataTypeName(data_type)) };
        return Err(SarError::Processing(format!(
            "Cannot smooth complex {} band, smoothing needs a real-valued measurement",
            name.to_string_lossy()
        )));
    }
    Ok(())
}

fn band_data_type(band: &RasterBand) -> GDALDataType::Type {
    unsafe { gdal_sys::GDALGetRasterDataType(band.c_rasterband()) }
}

fn smooth_band(dataset: &Dataset, smooth: usize) -> SarResult<()> {
    let (width, height) = dataset.raster_size();
    let band = dataset.rasterband(1)?;
    ensure_real_band(band_data_type(&band))?;
    let buffer = band.read_as::<f64>((0, 0), (width, height), (width, height), None)?;
    let values = Array2::from_shape_vec((height, width), buffer.data)
        .map_err(|e| SarError::InvalidFormat(format!("Band buffer shape mismatch: {}", e)))?;

    let reduced = rms_reduce(&values, smooth)?;
    let mean = reduced.mean().unwrap_or(0.0);
    if mean < 1.0 {
        return Err(SarError::Processing(
            "GDAL returned empty band. Try to use smallest smooth size".to_string(),
        ));
    }

    let smoothed = nearest_expand(&reduced, smooth, (height, width));
    let mut band = dataset.rasterband(1)?;
    let buffer = Buffer {
        size: (width, height),
        data: smoothed.into_raw_vec(),
    };
    band.write((0, 0), (width, height), &buffer)?;
    Ok(())
}

/// Rewrite a SAFE directory with recompressed measurement files.
///
/// The output is assembled under `<safe_out>.tmp` and renamed once complete;
/// annotations and the manifest are copied as-is. Returns the output path.
pub fn compress_safe<P: AsRef<Path>, Q: AsRef<Path>>(
    safe_in: P,
    safe_out: Q,
    options: &CompressOptions,
) -> SarResult<PathBuf> {
    let safe_in = safe_in.as_ref();
    let safe_out = safe_out.as_ref();
    log::info!("Compressing SAFE {} -> {}", safe_in.display(), safe_out.display());

    if safe_out.exists() {
        return Err(SarError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", safe_out.display()),
        )));
    }

    let mut tmp_name = safe_out.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    if tmp.exists() {
        log::debug!("Removing stale {}", tmp.display());
        fs::remove_dir_all(&tmp)?;
    }
    fs::create_dir(&tmp)?;

    copy_dir(&safe_in.join("annotation"), &tmp.join("annotation"))?;
    fs::copy(safe_in.join("manifest.safe"), tmp.join("manifest.safe"))?;
    fs::create_dir(tmp.join("measurement"))?;

    let creation_options: Vec<RasterCreationOption> = options
        .creation_options
        .iter()
        .map(|(key, value)| RasterCreationOption {
            key: key.as_str(),
            value: value.as_str(),
        })
        .collect();

    let timing = Timing::detect();
    for tiff in measurement_files(safe_in)? {
        let file_name = tiff
            .file_name()
            .ok_or_else(|| SarError::InvalidFormat(format!("Bad measurement path {}", tiff.display())))?;
        let target = tmp.join("measurement").join(file_name);
        log::debug!("Rewriting {}", target.display());

        timing.run(&file_name.to_string_lossy(), || -> SarResult<()> {
            let src = Dataset::open(&tiff)?;
            let dst = src.create_copy(&src.driver(), &target, &creation_options)?;
            if options.smooth > 1 {
                smooth_band(&dst, options.smooth)?;
            }
            Ok(())
        })?;
    }

    fs::rename(&tmp, safe_out)?;
    log::info!("SAFE written to {}", safe_out.display());
    Ok(safe_out.to_path_buf())
}
