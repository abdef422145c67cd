//! Encode/decode round-trip matrix across dtypes, shapes and endianness,
//! including the bit-for-bit property for uncompressed dense arrays.

use jdata_pack::{
    BjdataDecoder, BjdataEncoder, DecodeOptions, Dtype, Endian, NdArray, Node,
};
use proptest::prelude::*;

const DTYPES: [Dtype; 7] = [
    Dtype::Int8,
    Dtype::Uint8,
    Dtype::Int16,
    Dtype::Int32,
    Dtype::Int64,
    Dtype::Float32,
    Dtype::Float64,
];

fn value_for(dtype: Dtype, i: usize) -> f64 {
    match dtype {
        Dtype::Int8 => (i as f64) - 4.0,
        Dtype::Uint8 => (i % 200) as f64,
        Dtype::Int16 => (i as f64) * 17.0 - 100.0,
        Dtype::Int32 => (i as f64) * 70001.0 - 3.0,
        Dtype::Int64 => (i as f64) * 1.0e10,
        Dtype::Float32 => (i as f64) * 0.25,
        Dtype::Float64 => (i as f64) * 0.125 - 2.5,
    }
}

#[test]
fn dense_dtype_shape_matrix_roundtrips_bit_for_bit() {
    let shapes: [&[usize]; 4] = [&[1], &[6], &[2, 3], &[2, 2, 2]];
    for dtype in DTYPES {
        for shape in shapes {
            let count: usize = shape.iter().product();
            let vals: Vec<f64> = (0..count).map(|i| value_for(dtype, i)).collect();
            let node = Node::Tensor(NdArray::from_f64s(dtype, shape.to_vec(), &vals));
            for endian in [Endian::Big, Endian::Little] {
                let mut enc = BjdataEncoder::with_endian(endian);
                let bytes = enc.encode(&node).unwrap();
                let dec = BjdataDecoder::with_options(DecodeOptions {
                    endian,
                    ..Default::default()
                });
                let back = dec.decode(&bytes).unwrap();
                assert_eq!(back, node, "dtype {:?} shape {:?}", dtype, shape);
                // encode(decode(bytes)) == bytes, bit for bit.
                let again = enc.encode(&back).unwrap();
                assert_eq!(again, bytes, "dtype {:?} shape {:?}", dtype, shape);
            }
        }
    }
}

#[test]
fn mixed_document_roundtrip() {
    let node = Node::Object(vec![
        ("title".into(), Node::Str("observation".into())),
        (
            "grid".into(),
            Node::Tensor(NdArray::from_f64s(
                Dtype::Float64,
                vec![3, 2],
                &[0.0, 0.5, 1.0, 1.5, 2.0, 2.5],
            )),
        ),
        (
            "tags".into(),
            Node::Array(vec![Node::Str("a".into()), Node::Str("b".into())]),
        ),
        ("ok".into(), Node::Bool(true)),
        ("blob".into(), Node::Bytes(vec![0xde, 0xad, 0xbe, 0xef])),
    ]);
    let mut enc = BjdataEncoder::new();
    let bytes = enc.encode(&node).unwrap();
    let back = BjdataDecoder::new().decode(&bytes).unwrap();
    assert_eq!(back, node);
    assert_eq!(enc.encode(&back).unwrap(), bytes);
}

#[test]
fn extents_cover_every_leaf_of_a_mixed_document() {
    let node = Node::Object(vec![
        ("name".into(), Node::Str("run-7".into())),
        (
            "vals".into(),
            Node::Array(vec![Node::I16(3), Node::I16(-4)]),
        ),
        ("flag".into(), Node::Bool(false)),
    ]);
    let bytes = BjdataEncoder::new().encode(&node).unwrap();
    let (_, map) = BjdataDecoder::new().decode_with_extents(&bytes).unwrap();
    for path in ["$.name", "$.vals[0]", "$.vals[1]", "$.flag"] {
        assert!(map.get(path).is_some(), "missing extent for {path}");
    }
}

proptest! {
    #[test]
    fn prop_int32_tensor_roundtrips(vals in proptest::collection::vec(any::<i32>(), 1..64)) {
        let floats: Vec<f64> = vals.iter().map(|&v| v as f64).collect();
        let node = Node::Tensor(NdArray::from_f64s(Dtype::Int32, vec![vals.len()], &floats));
        let mut enc = BjdataEncoder::new();
        let bytes = enc.encode(&node).unwrap();
        let back = BjdataDecoder::new().decode(&bytes).unwrap();
        prop_assert_eq!(&back, &node);
        prop_assert_eq!(enc.encode(&back).unwrap(), bytes);
    }

    #[test]
    fn prop_strings_roundtrip(s in "\\PC{0,48}") {
        let node = Node::Str(s);
        let mut enc = BjdataEncoder::new();
        let bytes = enc.encode(&node).unwrap();
        let back = BjdataDecoder::new().decode(&bytes).unwrap();
        prop_assert_eq!(back, node);
    }

    #[test]
    fn prop_decoder_never_panics_on_noise(bytes in proptest::collection::vec(any::<u8>(), 0..128)) {
        let _ = BjdataDecoder::new().decode(&bytes);
    }
}
