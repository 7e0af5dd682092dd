use approx::assert_relative_eq;
use chrono::{Duration, TimeZone, Utc};
use ndarray::{array, Array2, ArrayD, IxDyn};
use sarutils::core::INTERPOLATION_COORD;
use sarutils::{
    map_blocks_coords, AddressingMode, BlockCoords, ChunkLayout, ChunkedArray, Coordinate,
    DataArray, MapBlocksOptions, SarError, SarResult,
};
use std::collections::BTreeMap;

fn burst_template(xint: Coordinate, chunks: &[usize]) -> DataArray<f64> {
    let layout = ChunkLayout::regular(&[3, 2], chunks).unwrap();
    let mut coords = BTreeMap::new();
    coords.insert("atrack".to_string(), Coordinate::from(vec![0i64, 1, 2]));
    coords.insert("xtrack".to_string(), Coordinate::from(vec![100i64, 200]));
    DataArray::new(
        ChunkedArray::full(layout, 0.0),
        vec!["atrack".into(), "xtrack".into()],
        coords,
    )
    .unwrap()
    .assign_coord(INTERPOLATION_COORD, xint)
    .unwrap()
}

fn add(coords: &BlockCoords, _kwargs: &()) -> SarResult<ArrayD<f64>> {
    let (az, rng) = coords
        .burst()
        .ok_or_else(|| SarError::Processing("burst coordinates expected".to_string()))?;
    Ok(Array2::from_shape_fn((az.nrows(), rng.ncols()), |(i, j)| az[[i, 0]] + rng[[0, j]]).into_dyn())
}

#[test]
fn test_burst_broadcasting() {
    let _ = env_logger::builder().is_test(true).try_init();

    let expected = array![[100.0, 200.0], [100.5, 200.5], [101.0, 201.0]].into_dyn();
    for chunks in [[3, 2], [1, 1], [2, 1]] {
        let da = burst_template(Coordinate::from(vec![0.0, 0.5, 1.0]), &chunks);
        let out = map_blocks_coords(&da, add, AddressingMode::Burst, (), MapBlocksOptions::default())
            .unwrap();
        assert_eq!(out.compute().unwrap(), expected, "chunks {:?}", chunks);
    }
}

#[test]
fn test_burst_time_index_is_cast_to_float() {
    let t0 = Utc.with_ymd_and_hms(2020, 1, 3, 17, 8, 15).unwrap();
    let times = vec![t0, t0 + Duration::milliseconds(250), t0 + Duration::milliseconds(500)];
    let da = burst_template(Coordinate::from(times), &[2, 2]);

    let out = map_blocks_coords(
        &da,
        |coords: &BlockCoords, t_ref: &f64| {
            let (az, rng) = coords.burst().expect("burst coordinates");
            Ok(Array2::from_shape_fn((az.nrows(), rng.ncols()), |(i, _)| az[[i, 0]] - t_ref).into_dyn())
        },
        AddressingMode::Burst,
        t0.timestamp() as f64,
        MapBlocksOptions::default(),
    )
    .unwrap();

    let values = out.compute().unwrap();
    assert_relative_eq!(values[IxDyn(&[0, 1])], 0.0);
    assert_relative_eq!(values[IxDyn(&[1, 0])], 0.25, epsilon = 1e-6);
    assert_relative_eq!(values[IxDyn(&[2, 1])], 0.5, epsilon = 1e-6);
}

#[test]
fn test_burst_probe_call() {
    let da = burst_template(Coordinate::from(vec![0.0, 0.5, 1.0]), &[2, 2]);
    let out = map_blocks_coords(&da, add, AddressingMode::Burst, (), MapBlocksOptions::default())
        .unwrap();
    let probe = out.data().probe().unwrap();
    assert_eq!(probe.shape(), &[0, 0]);
}

#[test]
fn test_misaligned_xint_fails_at_slice_time() {
    let da = burst_template(Coordinate::from(vec![0.0, 0.5]), &[2, 2]);
    let out = map_blocks_coords(&da, add, AddressingMode::Burst, (), MapBlocksOptions::default())
        .expect("misalignment is only detected when blocks are forced");
    assert!(matches!(
        out.compute(),
        Err(SarError::IndexOutOfRange { dim, .. }) if dim == INTERPOLATION_COORD
    ));
}

#[test]
fn test_burst_needs_two_dimensions() {
    let layout = ChunkLayout::regular(&[3], &[3]).unwrap();
    let mut coords = BTreeMap::new();
    coords.insert("atrack".to_string(), Coordinate::from(vec![0i64, 1, 2]));
    let da = DataArray::new(ChunkedArray::full(layout, 0.0f64), vec!["atrack".into()], coords)
        .unwrap()
        .assign_coord(INTERPOLATION_COORD, Coordinate::from(vec![0.0, 1.0, 2.0]))
        .unwrap();

    let result = map_blocks_coords(&da, add, AddressingMode::Burst, (), MapBlocksOptions::default());
    assert!(matches!(result, Err(SarError::Processing(_))));
}
