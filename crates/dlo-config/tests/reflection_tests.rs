use dlo_config::{
    extract, reflect, ConfigDocument, ConfigValue, FieldKind, FieldState, OverridePath,
};
use dlo_test_utils::{doc, TRAIN_CONFIG};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn path(s: &str) -> OverridePath {
    s.parse().unwrap()
}

#[test]
fn cached_override_shows_as_current_value() {
    let base = doc("a:\n  b: 1\n  c: x\n");
    let overrides = doc("a:\n  b: 5\n");

    let fields = reflect(&base, &overrides);
    let fields: Vec<_> = fields.iter().collect();

    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].path(), &path("a.b"));
    assert_eq!(fields[0].kind(), FieldKind::Int);
    assert_eq!(fields[0].current_value(), ConfigValue::Int(5));
    assert_eq!(fields[0].default_value(), &ConfigValue::Int(1));
    assert_eq!(fields[1].path(), &path("a.c"));
    assert_eq!(fields[1].kind(), FieldKind::Str);
    assert_eq!(fields[1].current_value(), ConfigValue::from("x"));
}

#[test]
fn editing_back_to_default_drops_path_and_group() {
    let base = doc("a:\n  b: 1\n  c: x\n");
    let mut fields = reflect(&base, &doc("a:\n  b: 5\n"));

    fields.get_mut(&path("a.b")).unwrap().set_int(1).unwrap();

    let overrides = extract(&fields);
    assert!(overrides.is_empty());
    assert!(overrides.get("a").is_none());
}

#[test]
fn list_text_edit_round_trips() {
    let base = doc("dims: [1, 2, 3]\n");
    let mut fields = reflect(&base, &ConfigDocument::new());

    let dims = fields.get_mut(&path("dims")).unwrap();
    assert_eq!(dims.kind(), FieldKind::List);
    assert_eq!(dims.state(), &FieldState::Text("1, 2, 3".into()));
    dims.set_text("1, 2, 4").unwrap();

    assert_eq!(extract(&fields), doc("dims: [1, 2, 4]\n"));
}

#[test]
fn unparsable_list_text_is_stored_verbatim() {
    let base = doc("dims: [1, 2, 3]\n");
    let mut fields = reflect(&base, &ConfigDocument::new());
    fields.get_mut(&path("dims")).unwrap().set_text("1, {2").unwrap();

    let overrides = extract(&fields);
    assert_eq!(overrides.get_path(&path("dims")), Some(&ConfigValue::from("1, {2")));
}

#[test]
fn bool_leaf_is_bool_even_next_to_ints() {
    let fields = reflect(&doc("flag: true\ncount: 1\n"), &ConfigDocument::new());
    let kinds: Vec<_> = fields.iter().map(|f| f.kind()).collect();
    assert_eq!(kinds, vec![FieldKind::Bool, FieldKind::Int]);
}

#[test]
fn training_fixture_reflects_every_leaf_kind() {
    let base = doc(TRAIN_CONFIG);
    let fields = reflect(&base, &ConfigDocument::new());

    let listing: Vec<_> = fields
        .iter()
        .map(|f| (f.path().to_string(), f.kind()))
        .collect();
    assert_eq!(
        listing,
        vec![
            ("seed".to_string(), FieldKind::Int),
            ("trainer.max_epochs".to_string(), FieldKind::Int),
            ("trainer.lr".to_string(), FieldKind::Float),
            ("trainer.use_amp".to_string(), FieldKind::Bool),
            ("trainer.devices".to_string(), FieldKind::List),
            ("model.name".to_string(), FieldKind::Str),
            ("model.channels".to_string(), FieldKind::List),
            ("model.dropout".to_string(), FieldKind::Float),
            ("data.root".to_string(), FieldKind::Str),
            ("data.num_workers".to_string(), FieldKind::Int),
            ("data.checkpoint".to_string(), FieldKind::Str),
        ]
    );
}

#[test]
fn reset_all_then_extract_is_empty() {
    let base = doc(TRAIN_CONFIG);
    let overrides = doc("trainer:\n  max_epochs: 5\n  use_amp: false\nmodel:\n  channels: [8]\n");
    let mut fields = reflect(&base, &overrides);
    assert_eq!(fields.modified().count(), 3);

    fields.reset_all();

    assert!(extract(&fields).is_empty());
    assert_eq!(fields.modified().count(), 0);
}

#[test]
fn nan_and_infinite_defaults_are_unmodified() {
    let base = doc("eps: .nan\nlimit: .inf\nfloor: -.inf\nscales: [.nan, 1.0]\n");
    let mut fields = reflect(&base, &ConfigDocument::new());
    assert_eq!(fields.modified().count(), 0);
    assert!(extract(&fields).is_empty());

    fields.get_mut(&path("eps")).unwrap().edit("0.5").unwrap();
    fields.reset_all();
    assert!(extract(&fields).is_empty());
}

#[test]
fn cached_nan_override_is_kept_against_finite_default() {
    let base = doc("eps: 0.1\n");
    let overrides = doc("eps: .nan\n");
    let fields = reflect(&base, &overrides);
    let extracted = extract(&fields);
    assert!(extracted.same_entries(&overrides));
}

#[test]
fn fields_under_group() {
    let fields = reflect(&doc(TRAIN_CONFIG), &ConfigDocument::new());
    let trainer = path("trainer");
    assert_eq!(fields.under(&trainer).count(), 4);
}

/// Mostly finite floats, with NaN and both infinities mixed in
fn float_value() -> impl Strategy<Value = f64> {
    prop_oneof![
        8 => -1.0e6..1.0e6_f64,
        1 => Just(f64::NAN),
        1 => Just(f64::INFINITY),
        1 => Just(f64::NEG_INFINITY),
    ]
}

fn list_scalar() -> impl Strategy<Value = ConfigValue> {
    prop_oneof![
        any::<bool>().prop_map(ConfigValue::Bool),
        any::<i64>().prop_map(ConfigValue::Int),
        float_value().prop_map(ConfigValue::Float),
        "[a-z0-9 ,:]{0,6}".prop_map(ConfigValue::Str),
    ]
}

fn leaf_value() -> impl Strategy<Value = ConfigValue> {
    prop_oneof![
        list_scalar(),
        prop::collection::vec(list_scalar(), 0..4).prop_map(ConfigValue::List),
    ]
}

/// Another value of the same field kind as `default`
fn same_kind(default: &ConfigValue) -> BoxedStrategy<ConfigValue> {
    match default {
        ConfigValue::Bool(_) => any::<bool>().prop_map(ConfigValue::Bool).boxed(),
        ConfigValue::Int(_) => any::<i64>().prop_map(ConfigValue::Int).boxed(),
        ConfigValue::Float(_) => float_value().prop_map(ConfigValue::Float).boxed(),
        ConfigValue::List(_) => prop::collection::vec(list_scalar(), 0..4)
            .prop_map(ConfigValue::List)
            .boxed(),
        _ => "[a-z ,]{0,8}".prop_map(ConfigValue::Str).boxed(),
    }
}

fn entries() -> impl Strategy<Value = Vec<(String, ConfigValue)>> {
    prop::collection::vec(("[a-z]{1,5}", leaf_value()), 0..4)
}

fn document() -> impl Strategy<Value = ConfigDocument> {
    (entries(), prop::collection::vec(("[a-z]{1,5}", entries()), 0..3)).prop_map(
        |(top, groups)| {
            let mut document: ConfigDocument = top.into_iter().collect();
            for (key, entries) in groups {
                let child: ConfigDocument = entries.into_iter().collect();
                document.insert(format!("g{key}"), ConfigValue::Map(child));
            }
            document
        },
    )
}

fn document_with_overrides() -> impl Strategy<Value = (ConfigDocument, Vec<(OverridePath, ConfigValue)>)> {
    document().prop_flat_map(|base| {
        let picks: Vec<_> = base
            .leaves()
            .into_iter()
            .map(|(leaf_path, default)| {
                proptest::option::of(same_kind(default))
                    .prop_map(move |value| value.map(|v| (leaf_path.clone(), v)))
            })
            .collect();
        (
            Just(base),
            picks.prop_map(|values| values.into_iter().flatten().collect::<Vec<_>>()),
        )
    })
}

proptest! {
    #[test]
    fn prop_extract_reflect_reproduces_effective_overrides(
        (base, picks) in document_with_overrides()
    ) {
        let mut overrides = ConfigDocument::new();
        let mut expected = ConfigDocument::new();
        for (leaf_path, value) in &picks {
            overrides.set_path(leaf_path, value.clone());
            if !base.get_path(leaf_path).is_some_and(|default| default.same_value(value)) {
                expected.set_path(leaf_path, value.clone());
            }
        }

        let fields = reflect(&base, &overrides);
        let extracted = extract(&fields);
        prop_assert!(extracted.same_entries(&expected), "{:?} != {:?}", extracted, expected);
    }

    #[test]
    fn prop_reset_all_extracts_nothing(
        (base, picks) in document_with_overrides()
    ) {
        let mut overrides = ConfigDocument::new();
        for (leaf_path, value) in &picks {
            overrides.set_path(leaf_path, value.clone());
        }

        let mut fields = reflect(&base, &overrides);
        fields.reset_all();
        prop_assert!(extract(&fields).is_empty());
    }
}
