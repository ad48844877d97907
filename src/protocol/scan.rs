use bytes::Bytes;

use super::RespValue;
use crate::error::{Error, Property, Result};

/// Parse a `SCAN`-family reply into the next cursor and the returned keys.
///
/// The reply must be `[cursor, [key, ...]]` with bulk cursor and keys; anything
/// else is a `Response/Format` error carrying the whole reply.
pub fn parse_scan_response(reply: &RespValue) -> Result<(Bytes, Vec<Bytes>)> {
    let wrong = || {
        Error::format("scan reply is not [cursor, [keys...]]")
            .with(Property::Response, format!("{:?}", reply))
    };

    let (cursor, keys) = match reply {
        RespValue::Error(err) => return Err(err.clone()),
        RespValue::Array(fields) => match fields.as_slice() {
            [RespValue::Bulk(cursor), RespValue::Array(keys)] => (cursor, keys),
            _ => return Err(wrong()),
        },
        _ => return Err(wrong()),
    };

    let keys = keys
        .iter()
        .map(|key| match key {
            RespValue::Bulk(key) => Ok(key.clone()),
            _ => Err(wrong()),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((cursor.clone(), keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ResponseError, ResultError};

    #[test]
    fn test_parse_scan_response() {
        let reply = RespValue::array(vec![
            RespValue::bulk_string("17"),
            RespValue::array(vec![
                RespValue::bulk_string("key:1"),
                RespValue::bulk_string("key:2"),
            ]),
        ]);

        let (cursor, keys) = parse_scan_response(&reply).unwrap();
        assert_eq!(cursor, Bytes::from("17"));
        assert_eq!(keys, vec![Bytes::from("key:1"), Bytes::from("key:2")]);
    }

    #[test]
    fn test_parse_scan_response_empty_batch() {
        let reply = RespValue::array(vec![RespValue::bulk_string("0"), RespValue::array(vec![])]);
        let (cursor, keys) = parse_scan_response(&reply).unwrap();
        assert_eq!(cursor, Bytes::from("0"));
        assert!(keys.is_empty());
    }

    #[test]
    fn test_parse_scan_response_wrong_shape() {
        let cases = vec![
            RespValue::integer(0),
            RespValue::array(vec![RespValue::bulk_string("0")]),
            RespValue::array(vec![RespValue::integer(0), RespValue::array(vec![])]),
            RespValue::array(vec![
                RespValue::bulk_string("0"),
                RespValue::array(vec![RespValue::integer(5)]),
            ]),
        ];

        for reply in cases {
            let err = parse_scan_response(&reply).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Response(ResponseError::Format));
            assert!(err.property(Property::Response).is_some());
        }
    }

    #[test]
    fn test_parse_scan_response_passes_error_through() {
        let reply = RespValue::error_reply("LOADING still loading");
        let err = parse_scan_response(&reply).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Result(ResultError::Loading));
        assert_eq!(Some(&err), reply.as_error());
    }
}
