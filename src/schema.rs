// Diesel table definitions. Keep in sync with `repository::schema_sql`.

diesel::table! {
    sources (id) {
        id -> Text,
        name -> Text,
        kind -> Text,
        config -> Text,
        base_url -> Text,
        category -> Nullable<Text>,
        group_name -> Nullable<Text>,
        rate_limit_ms -> Nullable<BigInt>,
        max_pages -> Nullable<Integer>,
        is_active -> Integer,
        created_at -> Text,
        last_scraped_at -> Nullable<Text>,
    }
}

diesel::table! {
    scrape_jobs (id) {
        id -> Text,
        source_id -> Text,
        status -> Text,
        started_at -> Text,
        finished_at -> Nullable<Text>,
        items_found -> Integer,
        items_created -> Integer,
        items_updated -> Integer,
        error_message -> Nullable<Text>,
    }
}

diesel::table! {
    catalog_entries (id) {
        id -> Text,
        name -> Text,
        normalized_name -> Text,
        group_name -> Nullable<Text>,
        member_name -> Nullable<Text>,
        series -> Nullable<Text>,
        rarity -> Nullable<Text>,
        release_date -> Nullable<Text>,
        image_url -> Nullable<Text>,
        source -> Text,
        source_url -> Nullable<Text>,
        verified -> Integer,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::joinable!(scrape_jobs -> sources (source_id));

diesel::allow_tables_to_appear_in_same_query!(sources, scrape_jobs, catalog_entries);
