//! Text and CSV dumps of measurement results.

use crate::{
    disk::CircularDiskDetector, grid::FixedGridDetector, isotropic::IsotropicRgbDetector,
    patch::AngularPatch,
};
use base::{error::GonioError, Hemisphere};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

const GRID_CSV_HEADER: [&str; 8] = [
    "Theta begin",
    "Theta end",
    "Phi begin",
    "Phi end",
    "Patch area",
    "Cos T",
    "Solid Proj. Angle",
    "Ratio",
];

fn csv_error(err: csv::Error) -> GonioError {
    GonioError::new("Failed to write CSV record", Some(Box::new(err)))
}

fn write_error(err: std::io::Error) -> GonioError {
    GonioError::from_io_error(err, "Failed to write measurement dump")
}

/// Creates (or truncates) a file and hands a buffered writer to `f`.
pub fn dump_to_file<F>(path: &Path, f: F) -> Result<(), GonioError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), GonioError>,
{
    let file = File::create(path).map_err(|err| {
        GonioError::from_io_error(err, format!("Failed to create file {}", path.display()))
    })?;
    let mut writer = BufWriter::new(file);
    f(&mut writer)?;
    writer.flush().map_err(write_error)?;
    log::info!("Measurement dumped to {}", path.display());
    Ok(())
}

/// Writes every patch of a grid detector as CSV, top hemisphere first.
///
/// Each hemisphere starts with a one-field record naming it followed by
/// the header. Angles are in degrees.
pub fn write_grid_csv<W: Write>(detector: &FixedGridDetector, writer: W) -> Result<(), GonioError> {
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(writer);
    for hemisphere in [Hemisphere::Top, Hemisphere::Bottom] {
        wtr.write_record([hemisphere.to_string()]).map_err(csv_error)?;
        wtr.write_record(GRID_CSV_HEADER).map_err(csv_error)?;
        for p in detector.patches(hemisphere) {
            wtr.write_record([
                p.theta_begin.to_degrees().to_string(),
                p.theta_end.to_degrees().to_string(),
                p.phi_begin.to_degrees().to_string(),
                p.phi_end.to_degrees().to_string(),
                p.area.to_string(),
                p.cos_theta_mean.to_string(),
                p.solid_projected_angle.to_string(),
                p.ratio.to_string(),
            ])
            .map_err(csv_error)?;
        }
    }
    wtr.flush().map_err(write_error)
}

fn write_row<W, I>(writer: &mut W, values: I) -> Result<(), GonioError>
where
    W: Write,
    I: IntoIterator<Item = f64>,
{
    let line = values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{}", line).map_err(write_error)
}

/// Writes the ratios of a grid detector, one ring per line, top rings first.
pub fn write_grid_matrix<W: Write>(
    detector: &FixedGridDetector,
    mut writer: W,
) -> Result<(), GonioError> {
    let slices = detector.n_slices().max(1);
    for hemisphere in [Hemisphere::Top, Hemisphere::Bottom] {
        for ring in detector.patches(hemisphere).chunks(slices) {
            write_row(&mut writer, ring.iter().map(|p| p.ratio))?;
        }
    }
    Ok(())
}

/// Writes one patch per line as
/// `thetaBegin thetaEnd phiBegin phiEnd ratio solidProjectedAngle`.
pub fn write_patch_list<W: Write>(
    patches: &[AngularPatch],
    mut writer: W,
) -> Result<(), GonioError> {
    for p in patches {
        write_row(
            &mut writer,
            [
                p.theta_begin,
                p.theta_end,
                p.phi_begin,
                p.phi_end,
                p.ratio,
                p.solid_projected_angle,
            ],
        )?;
    }
    Ok(())
}

/// Writes one ring per line as `thetaBegin thetaEnd X Y Z` (degrees, then
/// the XYZ ratio), top rings first.
pub fn write_isotropic_matrix<W: Write>(
    detector: &IsotropicRgbDetector,
    mut writer: W,
) -> Result<(), GonioError> {
    for p in detector.iter_patches() {
        let [x, y, z] = p.ratio.to_array();
        write_row(
            &mut writer,
            [p.theta_begin.to_degrees(), p.theta_end.to_degrees(), x, y, z],
        )?;
    }
    Ok(())
}

/// Writes one disk per line as `theta area cosT solidProjectedAngle ratio`
/// with `theta` in degrees.
pub fn write_disk_list<W: Write>(
    detector: &CircularDiskDetector,
    mut writer: W,
) -> Result<(), GonioError> {
    for d in detector.disks() {
        write_row(
            &mut writer,
            [
                d.theta.to_degrees(),
                d.area,
                d.cos_theta_mean,
                d.solid_projected_angle,
                d.ratio,
            ],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{adaptive::AdaptiveQuadtreeDetector, discretization::PatchDiscretization};
    use approx::assert_abs_diff_eq;

    fn fields(line: &str, sep: char) -> Vec<f64> {
        line.split(sep).map(|v| v.trim().parse().unwrap()).collect()
    }

    #[test]
    fn test_grid_csv_has_both_sections() {
        let mut grid = FixedGridDetector::new(4, 3, 1.0, PatchDiscretization::EqualAngles);
        grid.patch_mut(Hemisphere::Top, 0).unwrap().ratio = 0.25;
        let mut buf = Vec::new();
        write_grid_csv(&grid, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2 * (2 + 6));
        assert_eq!(lines[0], "Top hemisphere");
        assert_eq!(
            lines[1],
            "Theta begin,Theta end,Phi begin,Phi end,Patch area,Cos T,Solid Proj. Angle,Ratio"
        );
        let first = fields(lines[2], ',');
        assert_eq!(first.len(), 8);
        for (v, expected) in first.iter().zip([0.0, 45.0, 0.0, 120.0]) {
            assert_abs_diff_eq!(*v, expected, epsilon = 1e-9);
        }
        assert_eq!(first[7], 0.25);
        assert_eq!(lines[8], "Bottom hemisphere");
        let bottom = fields(lines[10], ',');
        assert_abs_diff_eq!(bottom[0], 135.0, epsilon = 1e-9);
        assert_abs_diff_eq!(bottom[1], 180.0, epsilon = 1e-9);
    }

    #[test]
    fn test_grid_matrix_rows() {
        let grid = FixedGridDetector::new(6, 5, 1.0, PatchDiscretization::EqualPsa);
        let mut buf = Vec::new();
        write_grid_matrix(&grid, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 6);
        assert!(text.lines().all(|l| l.split(' ').count() == 5));
    }

    #[test]
    fn test_patch_list_from_adaptive_tree() {
        let mut detector = AdaptiveQuadtreeDetector::new(1.0, 0.5, 4);
        detector.deposit_sample(0.2, 0.2, 1.0);
        let mut buf = Vec::new();
        write_patch_list(&detector.flatten_tree(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let rows: Vec<Vec<f64>> = text.lines().map(|l| fields(l, ' ')).collect();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.len() == 6));
        assert_eq!(rows[0][0], 0.0);
        assert_eq!(rows[3][3], std::f64::consts::TAU);
    }

    #[test]
    fn test_isotropic_and_disk_lists() {
        let iso = IsotropicRgbDetector::new(3, PatchDiscretization::EqualAngles);
        let mut buf = Vec::new();
        write_isotropic_matrix(&iso, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap().lines().count(), 6);

        let disks = CircularDiskDetector::new(5, 1.0, 0.1);
        let mut buf = Vec::new();
        write_disk_list(&disks, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 5);
        let middle = fields(text.lines().nth(2).unwrap(), ' ');
        assert_abs_diff_eq!(middle[0], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(middle[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_dump_to_file() {
        let path = std::env::temp_dir().join(format!("gonio-dump-{}.txt", std::process::id()));
        let grid = FixedGridDetector::new(2, 2, 1.0, PatchDiscretization::EqualPsa);
        dump_to_file(&path, |w| write_grid_matrix(&grid, w)).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        std::fs::remove_file(&path).unwrap();

        let missing = std::env::temp_dir().join("gonio-no-such-dir").join("dump.txt");
        let err = dump_to_file(&missing, |_| Ok(())).unwrap_err();
        assert!(err.message().starts_with("Failed to create file"));
    }
}
