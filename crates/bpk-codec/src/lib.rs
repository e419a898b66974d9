//! Stream codec for build packages.
//!
//! Packages travel as a self-delimiting stream of generic records: a
//! header naming the format version and payload compression, one
//! CRC-checked frame per record, and a trailer carrying the record count
//! and a BLAKE3 digest of everything before it. See [`frame`] for the
//! exact layout.
//!
//! Encoding goes through [`package_to_record`]. Decoding is parameterized
//! by a [`RecordInterpreter`], so a consumer can rebuild packages from
//! records however it likes; [`json_to_build_package`] is the built-in one.
//!
//! A stream that is truncated or corrupted anywhere fails with
//! [`CodecError::MalformedStream`]; it never decodes to a shorter list.

pub mod config;
pub mod error;
pub mod frame;
pub mod reader;
pub mod record;
pub mod writer;

use std::io::{Read, Write};

use bpk_model::BuildPackage;
use tracing::debug;

pub use config::{CodecConfig, Compression, DEFAULT_MAX_RECORD_SIZE};
pub use error::{CodecError, CodecResult, RecordError, RecordResult};
pub use reader::PackageStreamReader;
pub use record::{
    json_to_build_package, package_to_record, GenericRecord, RecordInterpreter, MAX_RECORD_DEPTH,
};
pub use writer::{PackageStreamWriter, StreamSummary};

/// Write `packages` to `sink` in order, with the default configuration.
///
/// The sink is flushed but not closed.
pub fn serialize_packages_to_stream<'a, W: Write>(
    packages: impl IntoIterator<Item = &'a BuildPackage>,
    sink: W,
) -> CodecResult<StreamSummary> {
    serialize_packages_to_stream_with(packages, sink, &CodecConfig::default())
}

/// Write `packages` to `sink` in order, using `config`.
pub fn serialize_packages_to_stream_with<'a, W: Write>(
    packages: impl IntoIterator<Item = &'a BuildPackage>,
    sink: W,
    config: &CodecConfig,
) -> CodecResult<StreamSummary> {
    let mut writer = PackageStreamWriter::new(sink, config.clone())?;
    for package in packages {
        writer.write_package(package)?;
    }
    writer.finish()
}

/// Read every record from `source` and turn each into a package with
/// `interpreter`, preserving stream order.
///
/// The first failure wins. Interpreter errors are returned as raised;
/// codec failures are converted through `From<CodecError>`.
pub fn parse_packages_from_stream<R, I>(
    source: R,
    interpreter: I,
) -> Result<Vec<BuildPackage>, I::Error>
where
    R: Read,
    I: RecordInterpreter,
    I::Error: From<CodecError>,
{
    let mut reader = PackageStreamReader::new(source)?;
    let mut packages = Vec::new();
    while let Some(package) = reader.read_package(&interpreter)? {
        packages.push(package);
    }
    debug!(packages = packages.len(), "package stream decoded");
    Ok(packages)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs::File;
    use std::io::{BufReader, BufWriter};

    use bpk_model::{
        AttributeMap, AttributeValue, BuildPackageParsingError, ParseOutcome, RawBuildRule,
        RawTargetNode,
    };
    use bpk_types::{BuildTarget, PackagePath, RuleKind, RuleType};
    use serde_json::json;

    use super::*;

    fn target(s: &str) -> BuildTarget {
        BuildTarget::parse(s).unwrap()
    }

    fn foo_bar() -> BuildPackage {
        let node = RawTargetNode::new(
            target("cell//foo/bar:baz"),
            RuleType::new("java_library", RuleKind::Build).unwrap(),
            AttributeMap::new()
                .with("attr1", "va1")
                .with("attr2", "val2"),
        );
        BuildPackage::new(
            PackagePath::new("foo/bar").unwrap(),
            [RawBuildRule::new(node, [target("cell//foo/bar:baz_lib")])],
            [BuildPackageParsingError::new(
                "parsing error",
                ["stack line 1", "stack line 2"],
            )],
        )
    }

    fn simple(path: &str, names: &[&str]) -> BuildPackage {
        let rules = names.iter().map(|name| {
            RawBuildRule::new(
                RawTargetNode::new(
                    target(&format!("//{path}:{name}")),
                    RuleType::new("genrule", RuleKind::Build).unwrap(),
                    AttributeMap::new(),
                ),
                [],
            )
        });
        BuildPackage::new(PackagePath::new(path).unwrap(), rules, [])
    }

    fn encode(packages: &[BuildPackage]) -> Vec<u8> {
        let mut buf = Vec::new();
        serialize_packages_to_stream(packages, &mut buf).unwrap();
        buf
    }

    fn decode(bytes: &[u8]) -> RecordResult<Vec<BuildPackage>> {
        parse_packages_from_stream(bytes, json_to_build_package)
    }

    #[test]
    fn single_package_roundtrip() {
        let pkg = foo_bar();
        let decoded = decode(&encode(&[pkg.clone()])).unwrap();
        assert_eq!(decoded, vec![pkg]);

        let back = &decoded[0];
        assert_eq!(back.path().as_str(), "foo/bar");
        assert_eq!(back.outcome(), ParseOutcome::PartialFailure);
        let rule = back.rule_for("baz").unwrap();
        assert_eq!(rule.target().cell().name(), Some("cell"));
        assert_eq!(rule.node().rule_type().name(), "java_library");
        assert_eq!(rule.node().rule_type().kind(), RuleKind::Build);
        assert_eq!(
            rule.node().attributes().get("attr2"),
            Some(&AttributeValue::from("val2"))
        );
        assert!(rule.depends_on(&target("cell//foo/bar:baz_lib")));
        assert_eq!(back.errors()[0].message(), "parsing error");
        assert_eq!(back.errors()[0].stacktrace(), ["stack line 1", "stack line 2"]);
    }

    #[test]
    fn preserves_package_order() {
        let packages = vec![
            simple("z", &["a"]),
            simple("a", &["z"]),
            simple("m/n", &["x", "y"]),
        ];
        let mut buf = Vec::new();
        let summary = serialize_packages_to_stream(&packages, &mut buf).unwrap();
        assert_eq!(summary.records, 3);
        assert_eq!(decode(&buf).unwrap(), packages);
    }

    #[test]
    fn empty_stream_decodes_to_nothing() {
        let bytes = encode(&[]);
        assert!(decode(&bytes).unwrap().is_empty());
    }

    #[test]
    fn empty_package_roundtrip() {
        let pkg = BuildPackage::new(PackagePath::root(), [], []);
        assert_eq!(pkg.outcome(), ParseOutcome::Empty);
        assert_eq!(decode(&encode(&[pkg.clone()])).unwrap(), vec![pkg]);
    }

    #[test]
    fn errors_keep_their_order() {
        let pkg = BuildPackage::new(
            PackagePath::new("p").unwrap(),
            [],
            [
                BuildPackageParsingError::new("second", ["b"]),
                BuildPackageParsingError::new("first", ["a"]),
                BuildPackageParsingError::new("second", ["b"]),
            ],
        );
        let decoded = decode(&encode(&[pkg])).unwrap();
        let messages: Vec<_> = decoded[0].errors().iter().map(|e| e.message()).collect();
        assert_eq!(messages, ["second", "first", "second"]);
    }

    #[test]
    fn rule_and_dep_order_does_not_matter() {
        let a = simple("p", &["one", "two", "three"]);
        let b = simple("p", &["three", "one", "two", "one"]);
        assert_eq!(a, b);
        assert_eq!(encode(&[a]), encode(&[b]));
    }

    #[test]
    fn every_truncation_is_malformed() {
        let bytes = encode(&[foo_bar(), simple("q", &["r"])]);
        for len in 0..bytes.len() {
            match decode(&bytes[..len]) {
                Err(RecordError::Stream(e)) => assert!(e.is_malformed(), "prefix {len}: {e}"),
                other => panic!("prefix {len} decoded to {other:?}"),
            }
        }
    }

    #[test]
    fn every_corrupted_byte_is_detected() {
        let bytes = encode(&[simple("q", &["r"])]);
        for i in 0..bytes.len() {
            let mut corrupted = bytes.clone();
            corrupted[i] ^= 0xFF;
            match decode(&corrupted) {
                Err(RecordError::Stream(e)) => assert!(e.is_malformed(), "byte {i}: {e}"),
                other => panic!("byte {i} flipped decoded to {other:?}"),
            }
        }
    }

    #[test]
    fn interpreter_errors_pass_through() {
        let mut buf = Vec::new();
        let mut writer = PackageStreamWriter::new(&mut buf, CodecConfig::default()).unwrap();
        let mut record = package_to_record(&foo_bar());
        record["rules"][0]["node"]["rule_type"]["kind"] = json!("deploy");
        writer.write_record(&record).unwrap();
        writer.finish().unwrap();

        let err = decode(&buf).unwrap_err();
        assert!(matches!(err, RecordError::UnknownRuleKind(ref k) if k == "deploy"));
    }

    #[derive(Debug)]
    enum Rejected {
        Codec(CodecError),
        Path(String),
    }

    impl From<CodecError> for Rejected {
        fn from(e: CodecError) -> Self {
            Self::Codec(e)
        }
    }

    #[test]
    fn custom_interpreter() {
        let bytes = encode(&[simple("keep", &["a"]), simple("drop", &["b"])]);

        // Renames every package and rejects one by path.
        let interpreter = |record: GenericRecord| -> Result<BuildPackage, Rejected> {
            let pkg = json_to_build_package(record).map_err(|e| Rejected::Path(e.to_string()))?;
            if pkg.path().as_str() == "drop" {
                return Err(Rejected::Path("drop".into()));
            }
            Ok(BuildPackage::new(
                PackagePath::new("renamed").unwrap(),
                pkg.rules().iter().cloned(),
                [],
            ))
        };
        let err = parse_packages_from_stream(bytes.as_slice(), interpreter).unwrap_err();
        assert!(matches!(err, Rejected::Path(ref p) if p == "drop"));

        let bytes = encode(&[simple("keep", &["a"])]);
        let decoded = parse_packages_from_stream(bytes.as_slice(), interpreter).unwrap();
        assert_eq!(decoded[0].path().as_str(), "renamed");

        let err = parse_packages_from_stream(&b"nope"[..], interpreter).unwrap_err();
        assert!(matches!(err, Rejected::Codec(ref e) if e.is_malformed()));
    }

    #[test]
    fn compressed_stream_roundtrip() {
        let packages = vec![foo_bar(), simple("a/b", &["c", "d"])];
        let config = CodecConfig::default().with_compression(Compression::Zstd { level: 7 });
        let mut buf = Vec::new();
        serialize_packages_to_stream_with(&packages, &mut buf, &config).unwrap();
        assert_eq!(decode(&buf).unwrap(), packages);
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packages.bpks");
        let packages = vec![foo_bar(), simple("x", &["y"])];

        let summary = {
            let file = BufWriter::new(File::create(&path).unwrap());
            serialize_packages_to_stream(&packages, file).unwrap()
        };
        assert_eq!(summary.bytes, std::fs::metadata(&path).unwrap().len());

        let file = BufReader::new(File::open(&path).unwrap());
        assert_eq!(
            parse_packages_from_stream(file, json_to_build_package).unwrap(),
            packages
        );
    }

    #[test]
    fn nested_attributes_survive_the_stream() {
        let mut dict = BTreeMap::new();
        dict.insert("deps".to_string(), AttributeValue::from(vec![":a", ":b"]));
        dict.insert("enabled".to_string(), AttributeValue::Bool(false));
        let node = RawTargetNode::new(
            target("other//lib:core#shared,debug"),
            RuleType::new("cxx_test", RuleKind::Test).unwrap(),
            AttributeMap::new()
                .with("config", AttributeValue::Dict(dict))
                .with("timeout", -30i64)
                .with("labels", Option::<&str>::None),
        );
        let pkg = BuildPackage::new(
            PackagePath::new("lib").unwrap(),
            [RawBuildRule::new(node, [target("//third_party:zlib")])],
            [],
        );
        assert_eq!(decode(&encode(&[pkg.clone()])).unwrap(), vec![pkg]);
    }

    fn nested_attribute(levels: usize) -> BuildPackage {
        let value = (0..levels).fold(AttributeValue::Int(7), |inner, _| {
            AttributeValue::List(vec![inner])
        });
        let node = RawTargetNode::new(
            target("//deep:x"),
            RuleType::new("genrule", RuleKind::Build).unwrap(),
            AttributeMap::new().with("nested", value),
        );
        BuildPackage::new(
            PackagePath::new("deep").unwrap(),
            [RawBuildRule::new(node, [])],
            [],
        )
    }

    // The record wraps attribute values in five levels: the record, `rules`,
    // the rule, `node` and `attributes`.
    const ATTRIBUTE_DEPTH_LIMIT: usize = MAX_RECORD_DEPTH - 5;

    #[test]
    fn attribute_nested_to_the_limit_roundtrips() {
        let pkg = nested_attribute(ATTRIBUTE_DEPTH_LIMIT);
        assert_eq!(decode(&encode(&[pkg.clone()])).unwrap(), vec![pkg]);
    }

    #[test]
    fn attribute_nested_past_the_limit_is_refused_on_encode() {
        let mut buf = Vec::new();
        let err =
            serialize_packages_to_stream(&[nested_attribute(ATTRIBUTE_DEPTH_LIMIT + 1)], &mut buf)
                .unwrap_err();
        assert!(matches!(err, CodecError::RecordTooDeep { .. }));
    }

    #[test]
    fn identifiers_with_odd_characters_roundtrip() {
        let node = RawTargetNode::new(
            target("my.cell//pkg/sub-dir/@v1:name.with@at#f/1,x:y"),
            RuleType::new("rule:with#chars", RuleKind::Configuration).unwrap(),
            AttributeMap::new().with("a:b#c,d", "//x:y#z"),
        );
        let pkg = BuildPackage::new(
            PackagePath::new("pkg/sub-dir/@v1").unwrap(),
            [RawBuildRule::new(node, [target("other//pkg:dep#a")])],
            [BuildPackageParsingError::new("bad: #,", ["at //x:y"])],
        );
        assert_eq!(decode(&encode(&[pkg.clone()])).unwrap(), vec![pkg]);
    }

    mod prop {
        use proptest::prelude::*;

        use super::*;

        fn attribute_value() -> impl Strategy<Value = AttributeValue> {
            let leaf = prop_oneof![
                Just(AttributeValue::None),
                any::<bool>().prop_map(AttributeValue::Bool),
                any::<i64>().prop_map(AttributeValue::Int),
                "[a-z0-9 :/]{0,8}".prop_map(AttributeValue::String),
            ];
            leaf.prop_recursive(3, 24, 4, |inner| {
                prop_oneof![
                    proptest::collection::vec(inner.clone(), 0..4).prop_map(AttributeValue::List),
                    proptest::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                        .prop_map(AttributeValue::Dict),
                ]
            })
        }

        fn rule(path: String) -> impl Strategy<Value = RawBuildRule> {
            (
                "[a-z][a-z0-9_]{0,6}",
                "[a-z_]{1,10}",
                proptest::sample::select(RuleKind::ALL.to_vec()),
                proptest::collection::btree_map("[a-z]{1,6}", attribute_value(), 0..4),
                proptest::collection::vec("[a-z]{1,4}", 0..3),
            )
                .prop_map(move |(name, rule_name, kind, attrs, deps)| {
                    let node = RawTargetNode::new(
                        BuildTarget::parse(&format!("//{path}:{name}")).unwrap(),
                        RuleType::new(&rule_name, kind).unwrap(),
                        attrs.into_iter().collect(),
                    );
                    let deps = deps
                        .iter()
                        .map(|dep| BuildTarget::parse(&format!("//{path}:{dep}")).unwrap());
                    RawBuildRule::new(node, deps)
                })
        }

        fn package() -> impl Strategy<Value = BuildPackage> {
            "[a-z]{1,5}(/[a-z]{1,5}){0,2}".prop_flat_map(|path| {
                (
                    Just(path.clone()),
                    proptest::collection::vec(rule(path), 0..4),
                    proptest::collection::vec(
                        (
                            "[a-zA-Z ]{0,12}",
                            proptest::collection::vec("[a-z.()]{0,12}", 0..3),
                        ),
                        0..3,
                    ),
                )
                    .prop_map(|(path, rules, errors)| {
                        BuildPackage::new(
                            PackagePath::new(&path).unwrap(),
                            rules,
                            errors
                                .into_iter()
                                .map(|(message, trace)| BuildPackageParsingError::new(message, trace)),
                        )
                    })
            })
        }

        proptest! {
            #[test]
            fn stream_roundtrip(
                packages in proptest::collection::vec(package(), 0..4),
                compress in any::<bool>(),
            ) {
                let config = if compress {
                    CodecConfig::default().with_compression(Compression::zstd())
                } else {
                    CodecConfig::default()
                };
                let mut buf = Vec::new();
                let summary = serialize_packages_to_stream_with(&packages, &mut buf, &config).unwrap();
                prop_assert_eq!(summary.records, packages.len() as u64);
                prop_assert_eq!(decode(&buf).unwrap(), packages);
            }
        }
    }
}
