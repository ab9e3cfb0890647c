use redis_emu::resp::{RespError, RespValue};

#[test]
fn test_encode_then_decode_is_identity() {
    let value = RespValue::Array(vec![
        RespValue::simple("OK"),
        RespValue::error("ERR nope"),
        RespValue::Integer(-42),
        RespValue::bulk("binary\r\nsafe"),
        RespValue::Null,
        RespValue::NullArray,
        RespValue::Array(vec![]),
        RespValue::bulk(""),
    ]);

    let encoded = value.encode();
    let (decoded, consumed) = RespValue::decode_next(&encoded).unwrap().unwrap();

    assert_eq!(decoded, value);
    assert_eq!(consumed, encoded.len());
}

#[test]
fn test_line_breaks_never_split_simple_frames() {
    assert_eq!(RespValue::simple("a\r\nb"), RespValue::simple("a  b"));
    assert_eq!(RespValue::error("ERR x\ny").encode(), b"-ERR x y\r\n".to_vec());

    // built directly, bypassing the constructors
    let raw = RespValue::Array(vec![
        RespValue::SimpleString("a\r\nb".to_string()),
        RespValue::Error("ERR \r\n:1".to_string()),
    ]);
    let encoded = raw.encode();
    let (decoded, consumed) = RespValue::decode_next(&encoded).unwrap().unwrap();

    assert_eq!(consumed, encoded.len());
    assert_eq!(
        decoded,
        RespValue::Array(vec![RespValue::simple("a  b"), RespValue::error("ERR   :1")])
    );
}

#[test]
fn test_decode_then_encode_is_byte_identical() {
    let fragment = b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$-1\r\n";

    let (value, consumed) = RespValue::decode_next(fragment).unwrap().unwrap();

    assert_eq!(consumed, fragment.len());
    assert_eq!(value.encode(), fragment.to_vec());
}

#[test]
fn test_every_prefix_is_incomplete() {
    let request = RespValue::bulk_array(["SET", "key", "value"]).encode();

    for end in 0..request.len() {
        assert_eq!(RespValue::decode_next(&request[..end]), Ok(None), "prefix of {}", end);
    }
}

#[test]
fn test_decode_stops_after_first_value() {
    let input = b"+PONG\r\n:1\r\n";

    let (value, consumed) = RespValue::decode_next(input).unwrap().unwrap();

    assert_eq!(value, RespValue::simple("PONG"));
    assert_eq!(consumed, 7);
    assert_eq!(
        RespValue::decode_next(&input[consumed..]),
        Ok(Some((RespValue::Integer(1), 4)))
    );
}

#[test]
fn test_malformed_input_is_rejected() {
    assert!(matches!(
        RespValue::decode_next(b"!oops\r\n"),
        Err(RespError::Malformed { position: 0, .. })
    ));
    assert!(matches!(
        RespValue::decode_next(b"$3\r\nabcde\r\n"),
        Err(RespError::Malformed { .. })
    ));
    assert!(matches!(
        RespValue::decode_next(b"*-2\r\n"),
        Err(RespError::Malformed { .. })
    ));
    assert!(matches!(
        RespValue::decode_next(b":12a\r\n"),
        Err(RespError::Malformed { .. })
    ));
}

#[test]
fn test_resource_mode_skips_comments_and_reports_truncation() {
    let resource = b"# header\n\n*2\r\n  # first\n:1\r\n\n:2\r\n\n";
    assert_eq!(
        RespValue::decode_resource(resource),
        Ok(RespValue::Array(vec![RespValue::Integer(1), RespValue::Integer(2)]))
    );

    let truncated = b"*2\r\n:1\r\n";
    let error = RespValue::decode_resource(truncated).unwrap_err();
    assert!(matches!(error, RespError::Incomplete { .. }));
    assert_eq!(error.line(), 3);

    assert!(matches!(
        RespValue::decode_resource(b":1\r\n:2\r\n"),
        Err(RespError::TrailingData { position: 4, .. })
    ));
}
