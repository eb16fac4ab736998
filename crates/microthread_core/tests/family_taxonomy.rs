use microthread_core::model::MetaValue;
use microthread_core::query::{
    aggregate_field, parse_aggregate, AggregateMap, Fields, SelectQuery, Statement,
};
use microthread_core::{Dialect, Engine, FamilyRepository, MetaRepository, TaxonomyRepository};

fn seed_posts(engine: &mut Engine, ids: &[i64]) {
    let rows = ids
        .iter()
        .map(|id| Fields::new().with("id", *id).with("raw", format!("post {id}")))
        .collect::<Vec<_>>();
    assert_eq!(engine.store().put_all("posts", &rows).unwrap(), ids.to_vec());
}

fn terms(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn count(engine: &mut Engine, sql: &str) -> i64 {
    engine
        .store()
        .find_one(&Statement::new(sql), |row| row.get(0))
        .unwrap()
        .unwrap()
}

#[test]
fn top_level_post_is_its_own_root() {
    let mut engine = Engine::in_memory().unwrap();
    seed_posts(&mut engine, &[10, 11, 12]);
    let mut family = FamilyRepository::new(engine.store());

    assert!(family.put_family(10, None).unwrap());
    assert!(family.put_family(11, Some(10)).unwrap());
    assert!(family.put_family(12, Some(10)).unwrap());
    assert!(!family.put_family(0, None).unwrap());

    assert_eq!(family.parent_of(10).unwrap(), Some(10));
    assert_eq!(family.parent_of(11).unwrap(), Some(10));
    assert_eq!(family.children_of(10, false).unwrap(), vec![10, 11, 12]);
    assert_eq!(family.children_of(10, true).unwrap(), vec![11, 12]);
}

#[test]
fn repeated_assignment_never_duplicates_terms() {
    let mut engine = Engine::in_memory().unwrap();
    seed_posts(&mut engine, &[1, 2]);
    let mut taxonomy = TaxonomyRepository::new(engine.store());

    let first = taxonomy.assign(1, "tag", &terms(&["rust"])).unwrap();
    let second = taxonomy.assign(2, "tag", &terms(&["rust"])).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first, second);

    assert_eq!(
        count(&mut engine, "SELECT COUNT(*) FROM taxonomy WHERE label = 'tag' AND term = 'rust';"),
        1
    );
    assert_eq!(count(&mut engine, "SELECT COUNT(*) FROM posts_taxonomy;"), 2);
}

#[test]
fn reassigning_the_same_terms_is_stable() {
    let mut engine = Engine::in_memory().unwrap();
    seed_posts(&mut engine, &[4]);
    let mut taxonomy = TaxonomyRepository::new(engine.store());

    let first = taxonomy.assign(4, "tag", &terms(&["a", "b"])).unwrap();
    let second = taxonomy.assign(4, "tag", &terms(&["a", "b"])).unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert_eq!(taxonomy.terms_for(4, "tag").unwrap(), terms(&["a", "b"]));

    assert_eq!(
        count(&mut engine, "SELECT COUNT(*) FROM taxonomy WHERE label = 'tag';"),
        2
    );
    assert_eq!(
        count(&mut engine, "SELECT COUNT(*) FROM posts_taxonomy WHERE post_id = 4;"),
        2
    );
}

#[test]
fn assignment_replaces_the_label_set() {
    let mut engine = Engine::in_memory().unwrap();
    seed_posts(&mut engine, &[7]);
    let mut taxonomy = TaxonomyRepository::new(engine.store());

    taxonomy.assign(7, "tag", &terms(&["music"])).unwrap();
    taxonomy.assign(7, "forum", &terms(&["general"])).unwrap();
    let ids = taxonomy.assign(7, "tag", &terms(&["music", "art"])).unwrap();
    assert_eq!(ids.len(), 2);

    assert_eq!(taxonomy.terms_for(7, "tag").unwrap(), terms(&["art", "music"]));
    assert_eq!(taxonomy.terms_for(7, "forum").unwrap(), terms(&["general"]));

    let listed = taxonomy.list_terms("tag").unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].term, "art");
    assert_eq!(listed[0].slug, "art");

    let links = "SELECT COUNT(*) FROM posts_taxonomy \
                 JOIN taxonomy ON taxonomy.id = posts_taxonomy.taxonomy_id \
                 WHERE posts_taxonomy.post_id = 7 AND taxonomy.label = 'tag';";
    assert_eq!(count(&mut engine, links), 2);
    assert_eq!(
        count(&mut engine, "SELECT COUNT(*) FROM posts_taxonomy WHERE post_id = 7;"),
        3
    );

    let mut taxonomy = TaxonomyRepository::new(engine.store());
    taxonomy.assign(7, "tag", &[]).unwrap();
    assert!(taxonomy.terms_for(7, "tag").unwrap().is_empty());
    assert_eq!(
        count(&mut engine, "SELECT COUNT(*) FROM taxonomy WHERE label = 'tag' AND term = 'music';"),
        1
    );
}

#[test]
fn apply_assigns_every_label_at_once() {
    let mut engine = Engine::in_memory().unwrap();
    seed_posts(&mut engine, &[3]);
    let mut map = AggregateMap::new();
    map.insert("tag".to_string(), terms(&["rust", "sqlite"]));
    map.insert("category".to_string(), terms(&["news"]));

    let mut taxonomy = TaxonomyRepository::new(engine.store());
    assert!(taxonomy.apply(3, &map).unwrap());
    assert_eq!(taxonomy.terms_for(3, "category").unwrap(), terms(&["news"]));
    assert!(!taxonomy.apply(0, &map).unwrap());
}

#[test]
fn sqlite_aggregate_decodes_to_assigned_terms() {
    let mut engine = Engine::in_memory().unwrap();
    seed_posts(&mut engine, &[5]);
    let mut expected = AggregateMap::new();
    expected.insert("forum".to_string(), terms(&["general"]));
    expected.insert("tag".to_string(), terms(&["art", "music"]));
    assert!(TaxonomyRepository::new(engine.store())
        .apply(5, &expected)
        .unwrap());

    let statement = SelectQuery::from("posts")
        .column(aggregate_field(
            Dialect::Sqlite,
            "taxonomy",
            "taxonomy_data",
            &["label", "term"],
        ))
        .join("JOIN posts_taxonomy ON posts_taxonomy.post_id = posts.id")
        .join("JOIN taxonomy ON taxonomy.id = posts_taxonomy.taxonomy_id")
        .condition("posts.id = :id")
        .bind("id", 5_i64)
        .group_by("posts.id")
        .build();
    let raw: String = engine
        .store()
        .find_one(&statement, |row| row.get("taxonomy_data"))
        .unwrap()
        .unwrap();

    let mut decoded = parse_aggregate(&raw);
    for values in decoded.values_mut() {
        values.sort();
    }
    assert_eq!(decoded, expected);
}

#[test]
fn meta_is_replaced_as_a_whole() {
    let mut engine = Engine::in_memory().unwrap();
    seed_posts(&mut engine, &[9]);
    let mut meta = MetaRepository::new(engine.store());

    let mut first = microthread_core::model::MetaMap::new();
    first.insert("title".to_string(), MetaValue::Text("Hello | world".to_string()));
    first.insert("blogpost".to_string(), MetaValue::Bool(true));
    assert!(meta.apply(9, &first).unwrap());

    let stored = meta.for_post(9).unwrap();
    assert_eq!(stored["title"], MetaValue::Text("Hello / world".to_string()));
    assert_eq!(stored["blogpost"].as_bool(), Some(true));

    let mut second = microthread_core::model::MetaMap::new();
    second.insert("password".to_string(), MetaValue::Password("hash".to_string()));
    assert!(meta.apply(9, &second).unwrap());
    let stored = meta.for_post(9).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored["password"].as_password_hash(), Some("hash"));

    assert_eq!(count(&mut engine, "SELECT COUNT(*) FROM meta;"), 1);
}
