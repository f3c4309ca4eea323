diesel::table! {
    users (id) {
        id -> Uuid,
        name -> Varchar,
        email -> Varchar,
        google_id -> Varchar,
        photo -> Varchar,
        bio -> Nullable<Text>,
        links -> Nullable<Varchar>,
        is_admin -> Bool,
        banned -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    listings (id) {
        id -> Uuid,
        title -> Varchar,
        description -> Nullable<Text>,
        price -> Float8,
        category -> Nullable<Varchar>,
        condition -> Nullable<Varchar>,
        image_url -> Nullable<Varchar>,
        seller_id -> Uuid,
        buyer_id -> Nullable<Uuid>,
        sold -> Bool,
        is_featured -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    favorites (user_id, listing_id) {
        user_id -> Uuid,
        listing_id -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    messages (id) {
        id -> Uuid,
        sender_id -> Uuid,
        receiver_id -> Uuid,
        content -> Text,
        listing_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    reviews (id) {
        id -> Uuid,
        reviewer_id -> Uuid,
        target_user_id -> Uuid,
        rating -> Int4,
        comment -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    reports (id) {
        id -> Uuid,
        reporter_id -> Uuid,
        reported_user_id -> Nullable<Uuid>,
        reported_listing_id -> Nullable<Uuid>,
        description -> Text,
        kind -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    notifications (id) {
        id -> Uuid,
        user_id -> Uuid,
        message -> Text,
        url -> Nullable<Varchar>,
        read -> Bool,
        created_at -> Timestamptz,
    }
}

// listings and messages each carry two user references, so only the
// seller/reviewer joins are declared; the other side is fetched by id.
diesel::joinable!(listings -> users (seller_id));
diesel::joinable!(reviews -> users (reviewer_id));
diesel::joinable!(favorites -> listings (listing_id));
diesel::joinable!(notifications -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    listings,
    favorites,
    messages,
    reviews,
    reports,
    notifications,
);
