use ndarray::{Array2, ArrayD, IxDyn};
use sarutils::core::{BlockInfo, BlockLocation};
use sarutils::{
    map_blocks_coords, AddressingMode, BlockCoords, ChunkLayout, ChunkedArray, Coordinate,
    DataArray, MapBlocksOptions, SarError, SarResult,
};
use std::collections::BTreeMap;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn template(chunks: &[usize]) -> DataArray<f64> {
    let layout = ChunkLayout::regular(&[4, 2], chunks).expect("valid chunks");
    let mut coords = BTreeMap::new();
    coords.insert("x".to_string(), Coordinate::from(vec![0i64, 1, 2, 3]));
    coords.insert("y".to_string(), Coordinate::from(vec![10i64, 20]));
    DataArray::new(ChunkedArray::full(layout, 0.0), vec!["x".into(), "y".into()], coords)
        .expect("valid template")
}

fn outer(coords: &BlockCoords, _kwargs: &()) -> SarResult<ArrayD<f64>> {
    let c = coords
        .direct()
        .ok_or_else(|| SarError::Processing("direct coordinates expected".to_string()))?;
    let (x, y) = (c[0].to_f64(), c[1].to_f64());
    Ok(Array2::from_shape_fn((x.len(), y.len()), |(i, j)| x[i] * y[j]).into_dyn())
}

#[test]
fn test_outer_product_is_partition_invariant() {
    init_logging();

    let expected = Array2::from_shape_fn((4, 2), |(i, j)| i as f64 * [10.0, 20.0][j]).into_dyn();

    for chunks in [[4, 2], [1, 1], [3, 1], [2, 2]] {
        let out = map_blocks_coords(
            &template(&chunks),
            outer,
            AddressingMode::Direct,
            (),
            MapBlocksOptions::default(),
        )
        .expect("registration");

        let values = out.compute().expect("compute");
        assert_eq!(values, expected, "chunks {:?}", chunks);
        assert_eq!(out.data().layout(), template(&chunks).data().layout());
    }
}

#[test]
fn test_every_block_matches_its_extent() {
    let out = map_blocks_coords(
        &template(&[3, 1]),
        outer,
        AddressingMode::Direct,
        (),
        MapBlocksOptions::default(),
    )
    .unwrap();

    let layout = out.data().layout().clone();
    for id in layout.block_ids() {
        let block = out.data().compute_block(&id).unwrap();
        let location = layout.block_location(&id).unwrap();
        assert_eq!(block.shape(), location.shape().as_slice());
    }
}

#[test]
fn test_output_keeps_dims_and_coords() {
    let da = template(&[2, 2]);
    let out = map_blocks_coords(&da, outer, AddressingMode::Direct, (), MapBlocksOptions::default())
        .unwrap();
    assert_eq!(out.dims(), da.dims());
    assert_eq!(out.coords(), da.coords());
    assert_eq!(out.shape(), vec![4, 2]);
}

#[test]
fn test_kwargs_are_shared_by_all_blocks() {
    let out = map_blocks_coords(
        &template(&[1, 2]),
        |coords: &BlockCoords, offset: &Vec<f64>| {
            let shape = coords.shape();
            Ok(ArrayD::from_elem(IxDyn(&shape), offset.iter().sum::<f64>()))
        },
        AddressingMode::Direct,
        vec![1.5, 2.5],
        MapBlocksOptions::default(),
    )
    .unwrap();
    assert_eq!(out.data().sum().unwrap(), 8.0 * 4.0);
}

#[test]
fn test_wrong_result_shape_fails_when_forced() {
    let out = map_blocks_coords(
        &template(&[2, 2]),
        |_coords: &BlockCoords, _: &()| Ok(ArrayD::from_elem(IxDyn(&[1]), 0.0f64)),
        AddressingMode::Direct,
        (),
        MapBlocksOptions::default(),
    )
    .expect("registration never runs the function");

    assert!(matches!(out.compute(), Err(SarError::ShapeMismatch { .. })));
}

#[test]
fn test_explicit_location_selects_coordinates() {
    let out = map_blocks_coords(
        &template(&[4, 2]),
        outer,
        AddressingMode::Direct,
        (),
        MapBlocksOptions::default(),
    )
    .unwrap();

    let info = BlockInfo {
        block_id: vec![0, 0],
        shape: vec![2, 1],
        location: Some(BlockLocation(vec![(2, 4), (1, 2)])),
    };
    let block = out.data().evaluate_block(&info).unwrap();
    assert_eq!(block.shape(), &[2, 1]);
    assert_eq!(block[IxDyn(&[0, 0])], 40.0);
    assert_eq!(block[IxDyn(&[1, 0])], 60.0);
}

#[test]
fn test_location_outside_coordinates_is_an_error() {
    let out = map_blocks_coords(
        &template(&[4, 2]),
        outer,
        AddressingMode::Direct,
        (),
        MapBlocksOptions::default(),
    )
    .unwrap();

    let info = BlockInfo {
        block_id: vec![0, 0],
        shape: vec![2, 1],
        location: Some(BlockLocation(vec![(3, 5), (0, 1)])),
    };
    assert!(matches!(
        out.data().evaluate_block(&info),
        Err(SarError::IndexOutOfRange { .. })
    ));
}
