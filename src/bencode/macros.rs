/// Build a [`BencodeElem`](bencode/enum.BencodeElem.html) from a literal-like description.
///
/// - integers and strings: as-is (anything with a `From` impl)
/// - bytes: `(b1, b2, ...)`
/// - list: `[e1, e2, ...]`
/// - dictionary: `{ (key, value), ... }` with `&str` keys
/// - raw dictionary: `r{ ([k1, k2, ...], value), ... }` with byte keys
///
/// Nested elements are single token trees, so negative integers inside
/// containers need to be bound to a variable first.
#[macro_export]
macro_rules! bencode_elem {
    (r{ $( ($key:tt, $val:tt) ),* $(,)? }) => {
        $crate::bencode::BencodeElem::RawDictionary(
            ::std::iter::IntoIterator::into_iter([ $( ($key.to_vec(), $crate::bencode_elem!($val)) ),* ])
                .collect()
        )
    };
    ({ $( ($key:tt, $val:tt) ),* $(,)? }) => {
        $crate::bencode::BencodeElem::Dictionary(
            ::std::iter::IntoIterator::into_iter([ $( ($key.to_owned(), $crate::bencode_elem!($val)) ),* ])
                .collect()
        )
    };
    ([ $( $element:tt ),* $(,)? ]) => {
        $crate::bencode::BencodeElem::List(vec![ $( $crate::bencode_elem!($element) ),* ])
    };
    (( $( $byte:tt ),* $(,)? )) => {
        $crate::bencode::BencodeElem::Bytes(vec![ $( $byte ),* ])
    };
    ($other:expr) => {
        $crate::bencode::BencodeElem::from($other)
    };
}

#[cfg(test)]
mod bencode_elem_macro_tests {
    use crate::bencode::BencodeElem;
    use std::collections::HashMap;

    #[test]
    fn scalars() {
        let owned = "spam".to_owned();
        assert_eq!(bencode_elem!(7_u8), BencodeElem::Integer(7));
        assert_eq!(bencode_elem!(-7_i64), BencodeElem::Integer(-7));
        assert_eq!(bencode_elem!(owned), BencodeElem::String("spam".to_owned()));
    }

    #[test]
    fn bytes() {
        assert_eq!(bencode_elem!((0x01, 0x02,)), BencodeElem::Bytes(vec![0x01, 0x02]));
        assert_eq!(bencode_elem!(()), BencodeElem::Bytes(vec![]));
    }

    #[test]
    fn nested() {
        let mut inner = HashMap::new();
        inner.insert("moo".to_owned(), BencodeElem::Integer(4));
        let mut outer = HashMap::new();
        outer.insert("cow".to_owned(), BencodeElem::Dictionary(inner));
        outer.insert(
            "list".to_owned(),
            BencodeElem::List(vec![BencodeElem::Integer(1), BencodeElem::String("x".to_owned())]),
        );

        assert_eq!(
            bencode_elem!({ ("cow", { ("moo", 4) }), ("list", [1, "x",]), }),
            BencodeElem::Dictionary(outer)
        );
        assert_eq!(bencode_elem!({}), BencodeElem::Dictionary(HashMap::new()));
    }

    #[test]
    fn raw_dictionary() {
        let mut dict = HashMap::new();
        dict.insert(vec![0xff, 0xf8], BencodeElem::String("moo".to_owned()));

        assert_eq!(bencode_elem!(r{ ([0xff, 0xf8], "moo") }), BencodeElem::RawDictionary(dict));
    }
}
