use waitlist::{Builder, Config, Pool};

#[test]
fn build_pool() {
    let mut builder = Builder::<u32>::new();
    let pool = builder.max_items(10).max_waiters(5).build();
    assert_eq!(pool.max_items(), 10);
    assert_eq!(pool.max_waiters(), 5);
}

#[test]
fn builder_defaults_are_unbounded() {
    let pool = Builder::<u32>::new().build();
    assert_eq!(pool.max_items(), 0);
    assert_eq!(pool.max_waiters(), 0);
}

#[test]
fn default_pool_is_open_and_unbounded() {
    let pool = Pool::<u32>::default();
    assert_eq!(pool.max_items(), 0);
    assert_eq!(pool.max_waiters(), 0);
    assert!(!pool.is_closed());
    assert_eq!(pool.ready(), 0);
    assert_eq!(pool.waiting(), 0);
    assert_eq!(pool.loads(), 0);
}

#[test]
fn with_config_keeps_limits() {
    let pool = Pool::<u32>::with_config(Config {
        max_items: 3,
        max_waiters: 7,
    });
    assert_eq!(pool.max_items(), 3);
    assert_eq!(pool.max_waiters(), 7);
}

#[cfg(feature = "serde")]
#[test]
fn config_from_json() {
    let config: Config = serde_json::from_str(r#"{"max_items": 4}"#).unwrap();
    assert_eq!(config.max_items, 4);
    assert_eq!(config.max_waiters, 0);

    let round_trip: Config = serde_json::from_str(&serde_json::to_string(&config).unwrap()).unwrap();
    assert_eq!(round_trip.max_items, 4);
}
