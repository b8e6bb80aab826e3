//! Property tests for protocol version ordering and document encoding.

use modelflow_core::fakes::{ColumnCopyExtractor, FieldSumScorer, WeightedSumScorer};
use modelflow_core::{
    ColumnFilter, ColumnSpec, DataRequest, ExtractEnvironment, FieldBinding, FilterType,
    KvStoreSpec, ModelDefinition, ModelEnvironment, PhaseRegistry, Property, ProtocolVersion,
    ScoreEnvironment, StoreType,
};
use proptest::collection::btree_map;
use proptest::prelude::*;

const NAME: &str = "[a-zA-Z_][a-zA-Z0-9_]{0,20}";
const VERSION: &str = "[0-9]{1,3}(\\.[0-9]{1,3}){0,3}";
const COLUMN: &str = "[a-z_][a-z0-9_]{0,6}(:[a-z0-9]{1,6})?";

fn registry() -> PhaseRegistry {
    let mut registry = PhaseRegistry::new();
    registry
        .register_default_extractor::<ColumnCopyExtractor>("test.Copy")
        .unwrap();
    registry
        .register_default_scorer::<FieldSumScorer>("test.Sum")
        .unwrap();
    registry
        .register_default_scorer::<WeightedSumScorer>("test.Weighted")
        .unwrap();
    registry
}

fn definition_strategy() -> impl Strategy<Value = ModelDefinition> {
    (NAME, VERSION, prop::sample::select(vec!["test.Sum", "test.Weighted"])).prop_map(
        |(name, version, scorer)| {
            ModelDefinition::new(name, version, "test.Copy", scorer, &registry()).unwrap()
        },
    )
}

fn filter_strategy() -> impl Strategy<Value = ColumnFilter> {
    prop_oneof![
        "[a-z]{1,5}".prop_map(|prefix| {
            ColumnFilter::new(
                FilterType::RegexQualifier,
                vec![Property::new("regex", format!("^{prefix}[0-9]*$"))],
            )
        }),
        ("[a-m]{1,3}", prop::option::of("[n-z]{1,3}")).prop_map(|(min, max)| {
            let mut properties = vec![Property::new("min_qualifier", min)];
            properties.extend(max.map(|max| Property::new("max_qualifier", max)));
            ColumnFilter::new(FilterType::ColumnRange, properties)
        }),
        Just(ColumnFilter::new(FilterType::And, vec![])),
    ]
}

fn columns_strategy() -> impl Strategy<Value = Vec<ColumnSpec>> {
    btree_map(COLUMN, (1i32..10, prop::option::of(filter_strategy())), 0..5).prop_map(
        |columns| {
            columns
                .into_iter()
                .map(|(name, (max_versions, filter))| {
                    let column = ColumnSpec::new(name).with_max_versions(max_versions);
                    match filter {
                        Some(filter) => column.with_filter(filter),
                        None => column,
                    }
                })
                .collect()
        },
    )
}

fn store_strategy() -> impl Strategy<Value = Vec<KvStoreSpec>> {
    let store_type = prop::sample::select(vec![
        StoreType::AvroKv,
        StoreType::AvroRecord,
        StoreType::TableBacked,
    ]);
    btree_map(NAME, store_type, 0..4).prop_map(|stores| {
        stores
            .into_iter()
            .map(|(name, store_type)| {
                let properties = store_type
                    .required_properties()
                    .iter()
                    .map(|property| Property::new(*property, format!("{name}_{property}")))
                    .collect();
                KvStoreSpec::new(store_type, name, properties)
            })
            .collect()
    })
}

fn extract_strategy() -> impl Strategy<Value = ExtractEnvironment> {
    (
        0i64..1_000_000,
        1i64..1_000_000,
        columns_strategy(),
        store_strategy(),
        btree_map(NAME, COLUMN, 0..4),
    )
        .prop_map(|(min, span, columns, kv_stores, bindings)| ExtractEnvironment {
            data_request: DataRequest::new(min, min + span, columns),
            kv_stores,
            field_bindings: bindings
                .into_iter()
                .map(|(tuple, store)| FieldBinding::new(tuple, store))
                .collect(),
        })
}

fn score_strategy() -> impl Strategy<Value = ScoreEnvironment> {
    (store_strategy(), "[a-z_][a-z0-9_]{0,6}:[a-z]{1,6}").prop_map(
        |(kv_stores, output_column_name)| ScoreEnvironment {
            kv_stores,
            output_column_name,
        },
    )
}

fn environment_strategy() -> impl Strategy<Value = ModelEnvironment> {
    (
        NAME,
        VERSION,
        prop::option::of(extract_strategy()),
        prop::option::of(score_strategy()),
    )
        .prop_map(|(name, version, extract, score)| {
            ModelEnvironment::new(name, version, "kiji://.env/default/t", extract, score).unwrap()
        })
}

proptest! {
    #[test]
    fn protocol_version_order_matches_numeric_order(
        a in (0u32..50, 0u32..50, 0u32..50),
        b in (0u32..50, 0u32..50, 0u32..50),
    ) {
        let left = ProtocolVersion::parse(&format!("p-{}.{}.{}", a.0, a.1, a.2)).unwrap();
        let right = ProtocolVersion::parse(&format!("p-{}.{}.{}", b.0, b.1, b.2)).unwrap();
        prop_assert_eq!(left.cmp(&right), a.cmp(&b));
        prop_assert_eq!(left.to_string().parse::<ProtocolVersion>().unwrap(), left);
    }

    #[test]
    fn valid_identifiers_always_construct(
        name in NAME,
        version in VERSION,
    ) {
        let registry = registry();
        let def = ModelDefinition::new(name.clone(), version.clone(), "test.Copy", "test.Sum", &registry);
        prop_assert!(def.is_ok());
        let env = ModelEnvironment::new(name, version, "kiji://.env/default/t", None, None);
        prop_assert!(env.is_ok());
    }

    #[test]
    fn arbitrary_text_never_panics_the_decoders(input in ".{0,200}") {
        let registry = registry();
        let _ = ModelDefinition::from_json(&input, &registry);
        let _ = ModelEnvironment::from_json(&input);
        let _ = ProtocolVersion::parse(&input);
    }

    #[test]
    fn invalid_names_are_rejected(name in "[a-z]{1,8}[ !@#-][a-z]{0,8}") {
        let errors = ModelDefinition::new(name, "1", "test.Copy", "test.Sum", &registry())
            .unwrap_err();
        prop_assert_eq!(errors.len(), 1);
    }

    #[test]
    fn definitions_survive_json(def in definition_strategy()) {
        let registry = registry();
        prop_assert!(def.validate(&registry).is_ok());
        let decoded = ModelDefinition::from_json(&def.to_json().unwrap(), &registry).unwrap();
        prop_assert_eq!(decoded, def);
    }

    #[test]
    fn environments_survive_json(env in environment_strategy()) {
        prop_assert!(env.validate().is_ok());
        let decoded = ModelEnvironment::from_json(&env.to_json().unwrap()).unwrap();
        prop_assert_eq!(decoded, env);
    }
}
