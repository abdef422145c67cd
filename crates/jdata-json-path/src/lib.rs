//! JSONPath-style query engine for decoded BJData/JData trees.
//!
//! Compiles `$`, `.key`, `['key']`, `[idx]`, `[lo:hi]`, `[*]` and `..key`
//! expressions into segments and evaluates them against [`jdata_pack::Node`]
//! values — including reconstructed tensors, which are addressable along
//! their leading axis.
//!
//! # Example
//!
//! ```
//! use jdata_json_path::{eval, PathParser};
//! use jdata_pack::Node;
//!
//! let doc = Node::Object(vec![(
//!     "a".into(),
//!     Node::Array(vec![Node::I8(1), Node::I8(2), Node::I8(3)]),
//! )]);
//! let path = PathParser::parse("$.a[1]").unwrap();
//! assert_eq!(eval(&path, &doc).unwrap(), vec![Node::I8(2)]);
//! ```

mod ast;
pub use ast::{JsonPath, Segment};

mod parser;
pub use parser::{ParseError, PathParser};

mod eval;
pub use eval::{eval, get, PathError};

#[cfg(test)]
mod tests {
    use super::*;
    use jdata_pack::{Dtype, NdArray, Node};

    fn obj(pairs: &[(&str, Node)]) -> Node {
        Node::Object(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    fn ints(vals: &[i64]) -> Node {
        Node::Array(vals.iter().map(|&v| Node::I64(v)).collect())
    }

    // ---- Parser ----

    #[test]
    fn test_parse_root_only() {
        let path = PathParser::parse("$").unwrap();
        assert_eq!(path.segments, vec![Segment::Root]);
    }

    #[test]
    fn test_parse_dot_and_bracket_names() {
        let path = PathParser::parse("$.store['item name']").unwrap();
        assert_eq!(
            path.segments[1..],
            [
                Segment::Key("store".into()),
                Segment::Key("item name".into())
            ]
        );
    }

    #[test]
    fn test_parse_index_slice_wildcard() {
        let path = PathParser::parse("$[3][-1][1:4][:2][*]").unwrap();
        assert_eq!(
            path.segments[1..],
            [
                Segment::Index(3),
                Segment::Index(-1),
                Segment::Slice(Some(1), Some(4)),
                Segment::Slice(None, Some(2)),
                Segment::Wildcard,
            ]
        );
    }

    #[test]
    fn test_parse_deep_scan() {
        let path = PathParser::parse("$..price").unwrap();
        assert_eq!(
            path.segments[1],
            Segment::DeepScan(Box::new(Segment::Key("price".into())))
        );
        let path = PathParser::parse("$..['odd name']").unwrap();
        assert_eq!(
            path.segments[1],
            Segment::DeepScan(Box::new(Segment::Key("odd name".into())))
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(PathParser::parse("a.b").unwrap_err(), ParseError::ExpectedRoot);
        assert!(PathParser::parse("$.").is_err());
        assert!(PathParser::parse("$[").is_err());
        assert!(PathParser::parse("$['open").is_err());
        assert!(PathParser::parse("$[?]").is_err());
        assert!(PathParser::parse("$.a?b").is_err());
    }

    #[test]
    fn test_canonical_display() {
        for text in ["$.a.b", "$['x y'][3][1:4][*]..k", "$[-2][:3]"] {
            let path = PathParser::parse(text).unwrap();
            assert_eq!(path.to_string(), text);
        }
    }

    // ---- Evaluation ----

    #[test]
    fn test_eval_key_and_index() {
        let doc = obj(&[("a", ints(&[1, 2, 3]))]);
        let path = PathParser::parse("$.a[1]").unwrap();
        assert_eq!(eval(&path, &doc).unwrap(), vec![Node::I64(2)]);
    }

    #[test]
    fn test_eval_negative_index() {
        let doc = obj(&[("a", ints(&[1, 2, 3]))]);
        let path = PathParser::parse("$.a[-1]").unwrap();
        assert_eq!(eval(&path, &doc).unwrap(), vec![Node::I64(3)]);
    }

    #[test]
    fn test_eval_slice_defaults() {
        let doc = ints(&[10, 20, 30, 40]);
        assert_eq!(
            eval(&PathParser::parse("$[1:3]").unwrap(), &doc).unwrap(),
            vec![Node::I64(20), Node::I64(30)]
        );
        assert_eq!(
            eval(&PathParser::parse("$[:]").unwrap(), &doc).unwrap().len(),
            4
        );
        assert_eq!(
            eval(&PathParser::parse("$[2:]").unwrap(), &doc).unwrap().len(),
            2
        );
    }

    #[test]
    fn test_eval_wildcard_object_and_array() {
        let doc = obj(&[("a", Node::I64(1)), ("b", Node::I64(2))]);
        assert_eq!(
            eval(&PathParser::parse("$[*]").unwrap(), &doc).unwrap(),
            vec![Node::I64(1), Node::I64(2)]
        );
    }

    #[test]
    fn test_eval_missing_key_is_not_found() {
        let doc = obj(&[("a", Node::I64(1))]);
        assert_eq!(
            eval(&PathParser::parse("$.b").unwrap(), &doc).unwrap_err(),
            PathError::NotFound(".b".into())
        );
    }

    #[test]
    fn test_eval_deep_scan_discovery_order() {
        let doc = obj(&[
            ("x", obj(&[("k", Node::I64(1))])),
            ("y", obj(&[("k", Node::I64(2))])),
        ]);
        let path = PathParser::parse("$..k").unwrap();
        assert_eq!(
            eval(&path, &doc).unwrap(),
            vec![Node::I64(1), Node::I64(2)]
        );
    }

    #[test]
    fn test_eval_deep_scan_shallow_before_deep() {
        let doc = obj(&[
            ("a", obj(&[("k", Node::I64(0)), ("sub", obj(&[("k", Node::I64(9))]))])),
            ("k", Node::I64(5)),
        ]);
        let path = PathParser::parse("$..k").unwrap();
        assert_eq!(
            eval(&path, &doc).unwrap(),
            vec![Node::I64(5), Node::I64(0), Node::I64(9)]
        );
    }

    #[test]
    fn test_eval_deep_scan_through_arrays() {
        let doc = obj(&[(
            "rows",
            Node::Array(vec![
                obj(&[("v", Node::I64(1))]),
                obj(&[("v", Node::I64(2))]),
            ]),
        )]);
        let path = PathParser::parse("$..v").unwrap();
        assert_eq!(
            eval(&path, &doc).unwrap(),
            vec![Node::I64(1), Node::I64(2)]
        );
    }

    #[test]
    fn test_eval_deep_scan_empty_is_non_fatal() {
        let doc = obj(&[("a", Node::I64(1))]);
        let path = PathParser::parse("$..zzz").unwrap();
        assert_eq!(eval(&path, &doc).unwrap(), Vec::<Node>::new());
        assert_eq!(get(&path, &doc).unwrap(), Node::Array(vec![]));
    }

    #[test]
    fn test_eval_trailing_segments_after_deep_scan() {
        let doc = obj(&[

            ("first", obj(&[("item", ints(&[1, 2]))])),
            ("second", obj(&[("item", ints(&[3, 4]))])),
        ]);
        let path = PathParser::parse("$..item[0]").unwrap();
        assert_eq!(
            eval(&path, &doc).unwrap(),
            vec![Node::I64(1), Node::I64(3)]
        );
        // A trailing miss after a scan drops the branch, not the query.
        let path = PathParser::parse("$..item[7]").unwrap();
        assert_eq!(eval(&path, &doc).unwrap(), Vec::<Node>::new());
    }

    #[test]
    fn test_eval_sanitized_key_rederivation() {
        // The decoder stores "my field" as "my_0x20_field"; queries use the
        // raw name.
        let doc = Node::Object(vec![("my_0x20_field".to_string(), Node::I64(7))]);
        let path = PathParser::parse("$['my field']").unwrap();
        assert_eq!(eval(&path, &doc).unwrap(), vec![Node::I64(7)]);
    }

    #[test]
    fn test_eval_map_is_table_like() {
        let doc = obj(&[(
            "table",
            Node::Map(vec![
                (Node::Str("alpha".into()), Node::I64(1)),
                (Node::I64(2), Node::I64(4)),
            ]),
        )]);
        assert_eq!(
            eval(&PathParser::parse("$.table.alpha").unwrap(), &doc).unwrap(),
            vec![Node::I64(1)]
        );
        // No wildcard/index access, and deep scan does not descend inside.
        assert!(eval(&PathParser::parse("$.table[*]").unwrap(), &doc).is_err());
        assert!(eval(&PathParser::parse("$.table[0]").unwrap(), &doc).is_err());
        assert_eq!(
            eval(&PathParser::parse("$..alpha").unwrap(), &doc).unwrap(),
            Vec::<Node>::new()
        );
    }

    #[test]
    fn test_eval_tensor_leading_axis() {
        let t = NdArray::from_f64s(Dtype::Int32, vec![2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let doc = obj(&[("m", Node::Tensor(t))]);
        match &eval(&PathParser::parse("$.m[1]").unwrap(), &doc).unwrap()[..] {
            [Node::Tensor(row)] => assert_eq!(row.to_f64_vec(), vec![4.0, 5.0, 6.0]),
            other => panic!("expected one sub-tensor, got {:?}", other),
        }
        let scalars = eval(&PathParser::parse("$.m[1][2]").unwrap(), &doc).unwrap();
        assert_eq!(scalars, vec![Node::I32(6)]);
        let all = eval(&PathParser::parse("$.m[*]").unwrap(), &doc).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_get_collapses_singleton() {
        let doc = obj(&[("a", ints(&[5, 6]))]);
        assert_eq!(
            get(&PathParser::parse("$.a[0]").unwrap(), &doc).unwrap(),
            Node::I64(5)
        );
        assert_eq!(
            get(&PathParser::parse("$.a[*]").unwrap(), &doc).unwrap(),
            Node::Array(vec![Node::I64(5), Node::I64(6)])
        );
    }

    #[test]
    fn test_eval_root_returns_document() {
        let doc = obj(&[("a", Node::I64(1))]);
        assert_eq!(eval(&PathParser::parse("$").unwrap(), &doc).unwrap(), vec![doc]);
    }
}
