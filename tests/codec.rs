use mdplab::codec::{decode, encode, DimensionPartition};

#[test]
fn rightmost_element_varies_fastest() {
    let sizes = vec![2, 3, 4];
    assert_eq!(encode(&[0, 0, 0], &sizes), 0);
    assert_eq!(encode(&[0, 0, 1], &sizes), 1);
    assert_eq!(encode(&[0, 1, 0], &sizes), 4);
    assert_eq!(encode(&[1, 0, 0], &sizes), 12);
    assert_eq!(decode(1, &sizes), vec![0, 0, 1]);
    assert_eq!(decode(12, &sizes), vec![1, 0, 0]);
}

#[test]
fn round_trip_over_the_whole_space() {
    let sizes = vec![2, 3, 4];
    for index in 0..24 {
        let coords = decode(index, &sizes);
        assert_eq!(encode(&coords, &sizes), index);
    }
    for a in 0..2 {
        for b in 0..3 {
            for c in 0..4 {
                let coords = vec![a, b, c];
                assert_eq!(decode(encode(&coords, &sizes), &sizes), coords);
            }
        }
    }
}

#[test]
fn partition_splits_and_joins() {
    let partition = DimensionPartition::new(&[2, 3, 4], &[0, 2]);
    assert_eq!(partition.relevant_flat_size(), 8);
    assert_eq!(partition.irrelevant_flat_size(), 3);
    assert!(partition.is_relevant(0));
    assert!(!partition.is_relevant(1));

    let (relevant, irrelevant) = partition.split(&[1, 2, 3]);
    assert_eq!(relevant, encode(&[1, 3], &[2, 4]));
    assert_eq!(irrelevant, Some(2));
    assert_eq!(partition.join(relevant, irrelevant), vec![1, 2, 3]);
}

#[test]
fn partition_with_every_dimension_relevant() {
    let partition = DimensionPartition::new(&[3, 3], &[0, 1]);
    assert_eq!(partition.relevant_flat_size(), 9);
    assert_eq!(partition.irrelevant_flat_size(), 0);
    let (relevant, irrelevant) = partition.split(&[2, 1]);
    assert_eq!(relevant, 7);
    assert_eq!(irrelevant, None);
    assert_eq!(partition.join(relevant, None), vec![2, 1]);
}

#[test]
fn split_then_join_round_trips() {
    let partition = DimensionPartition::new(&[2, 2, 3, 2], &[1, 2]);
    for index in 0..24 {
        let coords = decode(index, &[2, 2, 3, 2]);
        let (relevant, irrelevant) = partition.split(&coords);
        assert_eq!(partition.join(relevant, irrelevant), coords);
    }
}
