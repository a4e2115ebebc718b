use checkup_core::db::open_db_in_memory;
use checkup_core::{
    detail_key, listing_key, CacheError, CacheResult, CacheStore, CheckGroup, CheckGroupFields,
    GroupService, InMemoryCacheStore, Setmeal, SetmealFields, SetmealService, SetmealServiceError,
    SqliteGroupRepository, SqliteSetmealRepository,
};
use rusqlite::Connection;

fn group_fields(name: &str) -> CheckGroupFields {
    CheckGroupFields {
        code: None,
        name: name.to_string(),
        help_code: None,
        sex: None,
        remark: None,
        attention: None,
    }
}

fn setmeal_fields(name: &str) -> SetmealFields {
    SetmealFields {
        name: name.to_string(),
        code: None,
        help_code: None,
        sex: None,
        age: None,
        price: Some(199.0),
        remark: None,
        attention: None,
        img: None,
    }
}

fn seed_item(conn: &Connection, name: &str) -> i64 {
    conn.execute("INSERT INTO t_checkitem (name) VALUES (?1);", [name])
        .unwrap();
    conn.last_insert_rowid()
}

fn seed_order(conn: &Connection, setmeal_id: i64) -> i64 {
    conn.execute(
        "INSERT INTO t_order (setmeal_id, order_date) VALUES (?1, '2026-08-01');",
        [setmeal_id],
    )
    .unwrap();
    conn.last_insert_rowid()
}

/// Cache backend that fails every call, standing in for an unreachable
/// external deployment.
struct FailingCache;

impl CacheStore for FailingCache {
    fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Err(CacheError::Backend("connection refused".to_string()))
    }

    fn set(&self, _key: &str, _value: &str) -> CacheResult<()> {
        Err(CacheError::Backend("connection refused".to_string()))
    }

    fn delete(&self, _key: &str) -> CacheResult<()> {
        Err(CacheError::Backend("connection refused".to_string()))
    }
}

#[test]
fn add_assigns_id_links_groups_and_invalidates_listing() {
    let mut conn = open_db_in_memory().unwrap();
    let cache = InMemoryCacheStore::new();

    let (first_group, second_group) = {
        let repo = SqliteGroupRepository::try_new(&mut conn).unwrap();
        let mut service = GroupService::new(repo, &cache);
        (
            service.add(&group_fields("Cardio"), &[]).unwrap(),
            service.add(&group_fields("Vision"), &[]).unwrap(),
        )
    };

    cache.set(listing_key(), "[]").unwrap();

    let repo = SqliteSetmealRepository::try_new(&mut conn).unwrap();
    let mut service = SetmealService::new(repo, &cache);
    let setmeal_id = service
        .add(&setmeal_fields("Basic"), &[first_group, second_group])
        .unwrap();

    assert!(setmeal_id > 0);
    assert_eq!(cache.get(listing_key()).unwrap(), None);
    assert_eq!(
        service.group_ids_by_setmeal_id(setmeal_id).unwrap(),
        vec![first_group, second_group]
    );

    let listed = service.find_all().unwrap();
    assert_eq!(listed.len(), 1);
    assert!(cache.get(listing_key()).unwrap().is_some());
}

#[test]
fn find_all_serves_cached_snapshot_until_invalidated() {
    let mut conn = open_db_in_memory().unwrap();
    let cache = InMemoryCacheStore::new();

    let first_id = {
        let repo = SqliteSetmealRepository::try_new(&mut conn).unwrap();
        let mut service = SetmealService::new(repo, &cache);
        let first_id = service.add(&setmeal_fields("Basic"), &[]).unwrap();
        service.add(&setmeal_fields("Premium"), &[]).unwrap();

        let listed = service.find_all().unwrap();
        assert_eq!(listed.len(), 2);

        // The cached payload round-trips to the same collection.
        let payload = cache.get(listing_key()).unwrap().expect("listing cached");
        let decoded: Vec<Setmeal> = serde_json::from_str(&payload).unwrap();
        assert_eq!(decoded, listed);
        first_id
    };

    // A row written behind the cache's back stays invisible to the
    // read-through path while the snapshot is live.
    conn.execute("INSERT INTO t_setmeal (name) VALUES ('Phantom');", [])
        .unwrap();

    let repo = SqliteSetmealRepository::try_new(&mut conn).unwrap();
    let mut service = SetmealService::new(repo, &cache);
    assert_eq!(service.find_all().unwrap().len(), 2);

    let updated = Setmeal {
        id: first_id,
        fields: setmeal_fields("Basic v2"),
    };
    service.update(&updated, &[]).unwrap();

    let refreshed = service.find_all().unwrap();
    assert_eq!(refreshed.len(), 3);
    let names: Vec<&str> = refreshed
        .iter()
        .map(|setmeal| setmeal.fields.name.as_str())
        .collect();
    assert!(names.contains(&"Basic v2"));
    assert!(names.contains(&"Phantom"));
}

#[test]
fn detail_read_through_populates_key_and_update_invalidates_it() {
    let mut conn = open_db_in_memory().unwrap();
    let cache = InMemoryCacheStore::new();
    let repo = SqliteSetmealRepository::try_new(&mut conn).unwrap();
    let mut service = SetmealService::new(repo, &cache);

    let setmeal_id = service.add(&setmeal_fields("Basic"), &[]).unwrap();
    let detail = service.find_detail_by_id(setmeal_id).unwrap().unwrap();
    assert_eq!(detail.fields.name, "Basic");

    let key = detail_key(setmeal_id);
    let payload = cache.get(&key).unwrap().expect("detail cached");
    let decoded: Setmeal = serde_json::from_str(&payload).unwrap();
    assert_eq!(decoded, detail);

    let updated = Setmeal {
        id: setmeal_id,
        fields: setmeal_fields("Basic Plus"),
    };
    service.update(&updated, &[]).unwrap();
    assert_eq!(cache.get(&key).unwrap(), None);

    let refreshed = service.find_detail_by_id(setmeal_id).unwrap().unwrap();
    assert_eq!(refreshed.fields.name, "Basic Plus");
    assert!(cache.get(&key).unwrap().is_some());
}

#[test]
fn absent_package_detail_is_none_and_caches_nothing() {
    let mut conn = open_db_in_memory().unwrap();
    let cache = InMemoryCacheStore::new();
    let repo = SqliteSetmealRepository::try_new(&mut conn).unwrap();
    let service = SetmealService::new(repo, &cache);

    assert!(service.find_detail_by_id(4242).unwrap().is_none());
    assert!(cache.is_empty());
}

#[test]
fn group_update_invalidates_details_of_referencing_packages_only() {
    let mut conn = open_db_in_memory().unwrap();
    let cache = InMemoryCacheStore::new();

    let group_id = {
        let repo = SqliteGroupRepository::try_new(&mut conn).unwrap();
        let mut service = GroupService::new(repo, &cache);
        service.add(&group_fields("Cardio"), &[]).unwrap()
    };

    let (first, second, bystander) = {
        let repo = SqliteSetmealRepository::try_new(&mut conn).unwrap();
        let mut service = SetmealService::new(repo, &cache);
        let first = service.add(&setmeal_fields("Basic"), &[group_id]).unwrap();
        let second = service
            .add(&setmeal_fields("Premium"), &[group_id])
            .unwrap();
        let bystander = service.add(&setmeal_fields("Solo"), &[]).unwrap();

        service.find_all().unwrap();
        service.find_detail_by_id(first).unwrap();
        service.find_detail_by_id(second).unwrap();
        service.find_detail_by_id(bystander).unwrap();
        (first, second, bystander)
    };

    {
        let repo = SqliteGroupRepository::try_new(&mut conn).unwrap();
        let mut service = GroupService::new(repo, &cache);
        let group = CheckGroup {
            id: group_id,
            fields: group_fields("Cardio v2"),
        };
        service.update(&group, &[]).unwrap();
    }

    assert_eq!(cache.get(&detail_key(first)).unwrap(), None);
    assert_eq!(cache.get(&detail_key(second)).unwrap(), None);
    // Packages that do not reference the group keep their entries, and
    // the listing is untouched by group updates.
    assert!(cache.get(&detail_key(bystander)).unwrap().is_some());
    assert!(cache.get(listing_key()).unwrap().is_some());
}

#[test]
fn delete_is_rejected_while_orders_reference_the_package() {
    let mut conn = open_db_in_memory().unwrap();
    let cache = InMemoryCacheStore::new();

    let setmeal_id = {
        let repo = SqliteSetmealRepository::try_new(&mut conn).unwrap();
        let mut service = SetmealService::new(repo, &cache);
        service.add(&setmeal_fields("Basic"), &[]).unwrap()
    };
    let order_id = seed_order(&conn, setmeal_id);

    {
        let repo = SqliteSetmealRepository::try_new(&mut conn).unwrap();
        let mut service = SetmealService::new(repo, &cache);
        service.find_all().unwrap();
        service.find_detail_by_id(setmeal_id).unwrap();

        let err = service.delete_by_id(setmeal_id).unwrap_err();
        match err {
            SetmealServiceError::SetmealInUse { id, orders } => {
                assert_eq!(id, setmeal_id);
                assert_eq!(orders, 1);
            }
            other => panic!("unexpected error: {other}"),
        }

        // The rejection mutated nothing: row and cache entries survive.
        assert!(service.find_by_id(setmeal_id).unwrap().is_some());
        assert!(cache.get(listing_key()).unwrap().is_some());
        assert!(cache.get(&detail_key(setmeal_id)).unwrap().is_some());
    }

    conn.execute("DELETE FROM t_order WHERE id = ?1;", [order_id])
        .unwrap();

    let repo = SqliteSetmealRepository::try_new(&mut conn).unwrap();
    let mut service = SetmealService::new(repo, &cache);
    service.delete_by_id(setmeal_id).unwrap();
    assert!(service.find_by_id(setmeal_id).unwrap().is_none());
    assert_eq!(cache.get(listing_key()).unwrap(), None);
    assert_eq!(cache.get(&detail_key(setmeal_id)).unwrap(), None);
}

#[test]
fn unreachable_cache_degrades_every_path_to_the_store() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteSetmealRepository::try_new(&mut conn).unwrap();
    let mut service = SetmealService::new(repo, FailingCache);

    let setmeal_id = service.add(&setmeal_fields("Basic"), &[]).unwrap();
    assert_eq!(service.find_all().unwrap().len(), 1);
    assert!(service.find_detail_by_id(setmeal_id).unwrap().is_some());

    let updated = Setmeal {
        id: setmeal_id,
        fields: setmeal_fields("Basic v2"),
    };
    service.update(&updated, &[]).unwrap();
    service.delete_by_id(setmeal_id).unwrap();
    assert!(service.find_by_id(setmeal_id).unwrap().is_none());
}

#[test]
fn corrupted_listing_payload_is_treated_as_a_miss_and_repaired() {
    let mut conn = open_db_in_memory().unwrap();
    let cache = InMemoryCacheStore::new();
    let repo = SqliteSetmealRepository::try_new(&mut conn).unwrap();
    let mut service = SetmealService::new(repo, &cache);

    service.add(&setmeal_fields("Basic"), &[]).unwrap();
    cache.set(listing_key(), "not json").unwrap();

    let listed = service.find_all().unwrap();
    assert_eq!(listed.len(), 1);

    let payload = cache.get(listing_key()).unwrap().expect("listing repaired");
    let decoded: Vec<Setmeal> = serde_json::from_str(&payload).unwrap();
    assert_eq!(decoded, listed);
}

#[test]
fn expanded_detail_assembles_nested_graph_without_caching() {
    let mut conn = open_db_in_memory().unwrap();
    let first_item = seed_item(&conn, "Blood draw");
    let second_item = seed_item(&conn, "ECG");
    let cache = InMemoryCacheStore::new();

    let group_id = {
        let repo = SqliteGroupRepository::try_new(&mut conn).unwrap();
        let mut service = GroupService::new(repo, &cache);
        service
            .add(&group_fields("Cardio"), &[first_item, second_item])
            .unwrap()
    };

    let repo = SqliteSetmealRepository::try_new(&mut conn).unwrap();
    let mut service = SetmealService::new(repo, &cache);
    let setmeal_id = service.add(&setmeal_fields("Basic"), &[group_id]).unwrap();

    let detail = service.find_detail_expanded(setmeal_id).unwrap().unwrap();
    assert_eq!(detail.setmeal.id, setmeal_id);
    assert_eq!(detail.groups.len(), 1);
    assert_eq!(detail.groups[0].group.id, group_id);
    let item_ids: Vec<i64> = detail.groups[0].items.iter().map(|item| item.id).collect();
    assert_eq!(item_ids, vec![first_item, second_item]);

    assert!(cache.is_empty());
    assert!(service.find_detail_expanded(4242).unwrap().is_none());
}

#[test]
fn find_page_filters_packages_by_substring() {
    let mut conn = open_db_in_memory().unwrap();
    let cache = InMemoryCacheStore::new();
    let repo = SqliteSetmealRepository::try_new(&mut conn).unwrap();
    let mut service = SetmealService::new(repo, &cache);

    service.add(&setmeal_fields("Basic Care"), &[]).unwrap();
    service.add(&setmeal_fields("Premium Care"), &[]).unwrap();
    service.add(&setmeal_fields("Family"), &[]).unwrap();

    let filtered = service.find_page(Some("care"), 1, 10).unwrap();
    assert_eq!(filtered.total, 2);
    assert_eq!(filtered.rows.len(), 2);

    let unfiltered = service.find_page(None, 1, 2).unwrap();
    assert_eq!(unfiltered.total, 3);
    assert_eq!(unfiltered.rows.len(), 2);
}

#[test]
fn booking_report_counts_orders_per_package() {
    let mut conn = open_db_in_memory().unwrap();
    let cache = InMemoryCacheStore::new();

    let basic = {
        let repo = SqliteSetmealRepository::try_new(&mut conn).unwrap();
        let mut service = SetmealService::new(repo, &cache);
        let basic = service.add(&setmeal_fields("Basic"), &[]).unwrap();
        service.add(&setmeal_fields("Premium"), &[]).unwrap();
        basic
    };
    seed_order(&conn, basic);
    seed_order(&conn, basic);

    let repo = SqliteSetmealRepository::try_new(&mut conn).unwrap();
    let service = SetmealService::new(repo, &cache);
    let report = service.booking_report().unwrap();
    assert_eq!(report.len(), 2);
    assert_eq!(report[0].name, "Basic");
    assert_eq!(report[0].bookings, 2);
    assert_eq!(report[1].name, "Premium");
    assert_eq!(report[1].bookings, 0);
}

#[test]
fn list_images_returns_non_empty_references_only() {
    let mut conn = open_db_in_memory().unwrap();
    let cache = InMemoryCacheStore::new();
    let repo = SqliteSetmealRepository::try_new(&mut conn).unwrap();
    let mut service = SetmealService::new(repo, &cache);

    let mut with_image = setmeal_fields("Basic");
    with_image.img = Some("basic.jpg".to_string());
    service.add(&with_image, &[]).unwrap();
    service.add(&setmeal_fields("Premium"), &[]).unwrap();
    let mut second_image = setmeal_fields("Family");
    second_image.img = Some("family.jpg".to_string());
    service.add(&second_image, &[]).unwrap();

    assert_eq!(
        service.list_images().unwrap(),
        vec!["basic.jpg".to_string(), "family.jpg".to_string()]
    );
}
