use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{
    pooled_connection::{
        deadpool::{Object, Pool, PoolError},
        AsyncDieselConnectionManager, ManagerConfig,
    },
    AsyncPgConnection, RunQueryDsl,
};
use uuid::Uuid;

use crate::models::{
    Listing, Message, Notification, Report, Review, ReviewerInfo, SellerInfo, User,
};

pub type DbPool = Pool<AsyncPgConnection>;
pub type DbConn = Object<AsyncPgConnection>;

async fn establish_tls_connection(config: String) -> diesel::ConnectionResult<AsyncPgConnection> {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

    let (client, connection) = tokio_postgres::connect(&config, tls)
        .await
        .map_err(|e| diesel::ConnectionError::BadConnection(e.to_string()))?;

    // The connection task must outlive the client
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection error: {}", e);
        }
    });

    AsyncPgConnection::try_from(client).await
}

pub fn establish_connection_pool(database_url: &str) -> anyhow::Result<DbPool> {
    let mut manager_config = ManagerConfig::default();
    manager_config.custom_setup =
        Box::new(|url| Box::pin(establish_tls_connection(url.to_string())));

    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new_with_config(
        database_url,
        manager_config,
    );
    let pool = Pool::builder(config).build()?;

    Ok(pool)
}

pub async fn get_conn(pool: &DbPool) -> Result<DbConn, PoolError> {
    pool.get().await
}

// User database operations
pub mod users {
    use super::*;

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> anyhow::Result<Option<User>> {
        use crate::schema::users::dsl::*;

        let user = users
            .filter(id.eq(user_id))
            .select(User::as_select())
            .first::<User>(conn)
            .await
            .optional()?;

        Ok(user)
    }

    pub async fn get_by_email(
        conn: &mut AsyncPgConnection,
        email_addr: &str,
    ) -> anyhow::Result<Option<User>> {
        use crate::schema::users::dsl::*;

        let user = users
            .filter(email.eq(email_addr))
            .select(User::as_select())
            .first::<User>(conn)
            .await
            .optional()?;

        Ok(user)
    }

    pub async fn by_ids(conn: &mut AsyncPgConnection, ids: &[Uuid]) -> anyhow::Result<Vec<User>> {
        use crate::schema::users::dsl::*;

        let found = users
            .filter(id.eq_any(ids))
            .select(User::as_select())
            .load::<User>(conn)
            .await?;

        Ok(found)
    }

    pub async fn list_all(conn: &mut AsyncPgConnection) -> anyhow::Result<Vec<User>> {
        use crate::schema::users::dsl::*;

        let all = users
            .order_by(created_at.desc())
            .select(User::as_select())
            .load::<User>(conn)
            .await?;

        Ok(all)
    }

    /// Insert a new account. The unique index on `email` is the backstop
    /// against concurrent first logins; callers must treat a unique
    /// violation as "the account already exists".
    pub async fn create(
        conn: &mut AsyncPgConnection,
        name_val: &str,
        email_val: &str,
        google_id_val: &str,
        photo_val: &str,
    ) -> anyhow::Result<User> {
        use crate::schema::users::dsl::*;

        let user = diesel::insert_into(users)
            .values((
                name.eq(name_val),
                email.eq(email_val),
                google_id.eq(google_id_val),
                photo.eq(photo_val),
                is_admin.eq(false),
                banned.eq(false),
            ))
            .get_result::<User>(conn)
            .await?;

        Ok(user)
    }

    /// Refresh the provider-supplied fields on login.
    pub async fn refresh_identity(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
        name_val: &str,
        google_id_val: &str,
        photo_val: &str,
    ) -> anyhow::Result<User> {
        use crate::schema::users::dsl::*;

        let user = diesel::update(users.filter(id.eq(user_id)))
            .set((
                name.eq(name_val),
                google_id.eq(google_id_val),
                photo.eq(photo_val),
                updated_at.eq(Utc::now()),
            ))
            .get_result::<User>(conn)
            .await?;

        Ok(user)
    }

    pub async fn update_profile(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
        name_val: Option<&str>,
        bio_val: Option<&str>,
        photo_val: Option<&str>,
        links_val: Option<&str>,
    ) -> anyhow::Result<User> {
        use crate::schema::users::dsl::*;

        if let Some(n) = name_val {
            diesel::update(users.filter(id.eq(user_id)))
                .set(name.eq(n))
                .execute(conn)
                .await?;
        }
        if let Some(b) = bio_val {
            diesel::update(users.filter(id.eq(user_id)))
                .set(bio.eq(Some(b)))
                .execute(conn)
                .await?;
        }
        if let Some(p) = photo_val {
            diesel::update(users.filter(id.eq(user_id)))
                .set(photo.eq(p))
                .execute(conn)
                .await?;
        }
        if let Some(l) = links_val {
            diesel::update(users.filter(id.eq(user_id)))
                .set(links.eq(Some(l)))
                .execute(conn)
                .await?;
        }

        let user = diesel::update(users.filter(id.eq(user_id)))
            .set(updated_at.eq(Utc::now()))
            .get_result::<User>(conn)
            .await?;

        Ok(user)
    }

    pub async fn set_banned(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
        banned_val: bool,
    ) -> anyhow::Result<Option<User>> {
        use crate::schema::users::dsl::*;

        let user = diesel::update(users.filter(id.eq(user_id)))
            .set((banned.eq(banned_val), updated_at.eq(Utc::now())))
            .get_result::<User>(conn)
            .await
            .optional()?;

        Ok(user)
    }
}

/// Filters for the listing index query. All fields are optional and combine
/// conjunctively.
#[derive(Debug, Default)]
pub struct ListingFilter {
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub condition: Option<String>,
    pub seller: Option<Uuid>,
    pub search: Option<String>,
    pub newest_first: bool,
    pub limit: Option<i64>,
}

// Listing database operations
pub mod listings {
    use super::*;

    pub async fn list(
        conn: &mut AsyncPgConnection,
        filter: &ListingFilter,
    ) -> anyhow::Result<Vec<(Listing, SellerInfo)>> {
        use crate::schema::listings::dsl as l;
        use crate::schema::users;

        let mut query = l::listings
            .inner_join(users::table)
            .select((
                Listing::as_select(),
                (users::id, users::name, users::email),
            ))
            .into_boxed();

        if let Some(ref c) = filter.category {
            query = query.filter(l::category.eq(c.clone()));
        }
        if let Some(min) = filter.min_price {
            query = query.filter(l::price.ge(min));
        }
        if let Some(max) = filter.max_price {
            query = query.filter(l::price.le(max));
        }
        if let Some(ref c) = filter.condition {
            query = query.filter(l::condition.eq(c.clone()));
        }
        if let Some(s) = filter.seller {
            query = query.filter(l::seller_id.eq(s));
        }
        if let Some(ref s) = filter.search {
            query = query.filter(l::title.ilike(format!("%{}%", s)));
        }
        if filter.newest_first {
            query = query.order_by(l::created_at.desc());
        }
        if let Some(n) = filter.limit {
            query = query.limit(n);
        }

        let rows = query.load::<(Listing, SellerInfo)>(conn).await?;

        Ok(rows)
    }

    pub async fn get_with_seller(
        conn: &mut AsyncPgConnection,
        listing_id: Uuid,
    ) -> anyhow::Result<Option<(Listing, SellerInfo)>> {
        use crate::schema::listings::dsl as l;
        use crate::schema::users;

        let row = l::listings
            .inner_join(users::table)
            .filter(l::id.eq(listing_id))
            .select((
                Listing::as_select(),
                (users::id, users::name, users::email),
            ))
            .first::<(Listing, SellerInfo)>(conn)
            .await
            .optional()?;

        Ok(row)
    }

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        listing_id: Uuid,
    ) -> anyhow::Result<Option<Listing>> {
        use crate::schema::listings::dsl::*;

        let listing = listings
            .filter(id.eq(listing_id))
            .select(Listing::as_select())
            .first::<Listing>(conn)
            .await
            .optional()?;

        Ok(listing)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        conn: &mut AsyncPgConnection,
        seller: Uuid,
        title_val: &str,
        description_val: Option<&str>,
        price_val: f64,
        category_val: Option<&str>,
        condition_val: Option<&str>,
        image_url_val: Option<&str>,
    ) -> anyhow::Result<Listing> {
        use crate::schema::listings::dsl::*;

        let listing = diesel::insert_into(listings)
            .values((
                title.eq(title_val),
                description.eq(description_val),
                price.eq(price_val),
                category.eq(category_val),
                condition.eq(condition_val),
                image_url.eq(image_url_val),
                seller_id.eq(seller),
                sold.eq(false),
                is_featured.eq(false),
            ))
            .get_result::<Listing>(conn)
            .await?;

        Ok(listing)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update(
        conn: &mut AsyncPgConnection,
        listing_id: Uuid,
        title_val: Option<&str>,
        description_val: Option<&str>,
        price_val: Option<f64>,
        category_val: Option<&str>,
        condition_val: Option<&str>,
        image_url_val: Option<&str>,
    ) -> anyhow::Result<Listing> {
        use crate::schema::listings::dsl::*;

        if let Some(t) = title_val {
            diesel::update(listings.filter(id.eq(listing_id)))
                .set(title.eq(t))
                .execute(conn)
                .await?;
        }
        if let Some(d) = description_val {
            diesel::update(listings.filter(id.eq(listing_id)))
                .set(description.eq(Some(d)))
                .execute(conn)
                .await?;
        }
        if let Some(p) = price_val {
            diesel::update(listings.filter(id.eq(listing_id)))
                .set(price.eq(p))
                .execute(conn)
                .await?;
        }
        if let Some(c) = category_val {
            diesel::update(listings.filter(id.eq(listing_id)))
                .set(category.eq(Some(c)))
                .execute(conn)
                .await?;
        }
        if let Some(c) = condition_val {
            diesel::update(listings.filter(id.eq(listing_id)))
                .set(condition.eq(Some(c)))
                .execute(conn)
                .await?;
        }
        if let Some(u) = image_url_val {
            diesel::update(listings.filter(id.eq(listing_id)))
                .set(image_url.eq(Some(u)))
                .execute(conn)
                .await?;
        }

        let listing = diesel::update(listings.filter(id.eq(listing_id)))
            .set(updated_at.eq(Utc::now()))
            .get_result::<Listing>(conn)
            .await?;

        Ok(listing)
    }

    pub async fn delete(conn: &mut AsyncPgConnection, listing_id: Uuid) -> anyhow::Result<usize> {
        use crate::schema::listings::dsl::*;

        let count = diesel::delete(listings.filter(id.eq(listing_id)))
            .execute(conn)
            .await?;

        Ok(count)
    }

    pub async fn set_featured(
        conn: &mut AsyncPgConnection,
        listing_id: Uuid,
        featured: bool,
    ) -> anyhow::Result<Option<Listing>> {
        use crate::schema::listings::dsl::*;

        let listing = diesel::update(listings.filter(id.eq(listing_id)))
            .set((is_featured.eq(featured), updated_at.eq(Utc::now())))
            .get_result::<Listing>(conn)
            .await
            .optional()?;

        Ok(listing)
    }
}

// Favorite database operations
pub mod favorites {
    use super::*;

    /// Idempotent add, backed by the composite primary key.
    pub async fn add(
        conn: &mut AsyncPgConnection,
        user: Uuid,
        listing: Uuid,
    ) -> anyhow::Result<()> {
        use crate::schema::favorites::dsl::*;

        diesel::insert_into(favorites)
            .values((user_id.eq(user), listing_id.eq(listing)))
            .on_conflict_do_nothing()
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn remove(
        conn: &mut AsyncPgConnection,
        user: Uuid,
        listing: Uuid,
    ) -> anyhow::Result<()> {
        use crate::schema::favorites::dsl::*;

        diesel::delete(favorites.filter(user_id.eq(user).and(listing_id.eq(listing))))
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn listings_for_user(
        conn: &mut AsyncPgConnection,
        user: Uuid,
    ) -> anyhow::Result<Vec<Listing>> {
        use crate::schema::favorites::dsl as f;
        use crate::schema::listings;

        let saved = f::favorites
            .inner_join(listings::table)
            .filter(f::user_id.eq(user))
            .order_by(f::created_at.desc())
            .select(Listing::as_select())
            .load::<Listing>(conn)
            .await?;

        Ok(saved)
    }
}

// Message database operations
pub mod messages {
    use super::*;

    /// Every message the user sent or received, newest first.
    pub async fn involving(
        conn: &mut AsyncPgConnection,
        user: Uuid,
    ) -> anyhow::Result<Vec<Message>> {
        use crate::schema::messages::dsl::*;

        let msgs = messages
            .filter(sender_id.eq(user).or(receiver_id.eq(user)))
            .order_by(created_at.desc())
            .select(Message::as_select())
            .load::<Message>(conn)
            .await?;

        Ok(msgs)
    }

    /// The two-way thread between `user` and `other`, oldest first.
    pub async fn thread(
        conn: &mut AsyncPgConnection,
        user: Uuid,
        other: Uuid,
    ) -> anyhow::Result<Vec<Message>> {
        use crate::schema::messages::dsl::*;

        let msgs = messages
            .filter(
                sender_id
                    .eq(user)
                    .and(receiver_id.eq(other))
                    .or(sender_id.eq(other).and(receiver_id.eq(user))),
            )
            .order_by(created_at.asc())
            .select(Message::as_select())
            .load::<Message>(conn)
            .await?;

        Ok(msgs)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        sender: Uuid,
        receiver: Uuid,
        content_val: &str,
        listing: Option<Uuid>,
    ) -> anyhow::Result<Message> {
        use crate::schema::messages::dsl::*;

        let message = diesel::insert_into(messages)
            .values((
                sender_id.eq(sender),
                receiver_id.eq(receiver),
                content.eq(content_val),
                listing_id.eq(listing),
            ))
            .get_result::<Message>(conn)
            .await?;

        Ok(message)
    }
}

// Review database operations
pub mod reviews {
    use super::*;

    pub async fn for_target(
        conn: &mut AsyncPgConnection,
        target: Uuid,
    ) -> anyhow::Result<Vec<(Review, ReviewerInfo)>> {
        use crate::schema::reviews::dsl as r;
        use crate::schema::users;

        let rows = r::reviews
            .inner_join(users::table)
            .filter(r::target_user_id.eq(target))
            .order_by(r::created_at.desc())
            .select((Review::as_select(), (users::id, users::name)))
            .load::<(Review, ReviewerInfo)>(conn)
            .await?;

        Ok(rows)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        reviewer: Uuid,
        target: Uuid,
        rating_val: i32,
        comment_val: Option<&str>,
    ) -> anyhow::Result<Review> {
        use crate::schema::reviews::dsl::*;

        let review = diesel::insert_into(reviews)
            .values((
                reviewer_id.eq(reviewer),
                target_user_id.eq(target),
                rating.eq(rating_val),
                comment.eq(comment_val),
            ))
            .get_result::<Review>(conn)
            .await?;

        Ok(review)
    }
}

// Report database operations
pub mod reports {
    use super::*;

    pub async fn list_all(conn: &mut AsyncPgConnection) -> anyhow::Result<Vec<Report>> {
        use crate::schema::reports::dsl::*;

        let all = reports
            .order_by(created_at.desc())
            .select(Report::as_select())
            .load::<Report>(conn)
            .await?;

        Ok(all)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        reporter: Uuid,
        reported_user: Option<Uuid>,
        reported_listing: Option<Uuid>,
        description_val: &str,
        kind_val: &str,
    ) -> anyhow::Result<Report> {
        use crate::schema::reports::dsl::*;

        let report = diesel::insert_into(reports)
            .values((
                reporter_id.eq(reporter),
                reported_user_id.eq(reported_user),
                reported_listing_id.eq(reported_listing),
                description.eq(description_val),
                kind.eq(kind_val),
            ))
            .get_result::<Report>(conn)
            .await?;

        Ok(report)
    }

    pub async fn delete(conn: &mut AsyncPgConnection, report_id: Uuid) -> anyhow::Result<usize> {
        use crate::schema::reports::dsl::*;

        let count = diesel::delete(reports.filter(id.eq(report_id)))
            .execute(conn)
            .await?;

        Ok(count)
    }
}

// Notification database operations
pub mod notifications {
    use super::*;

    pub async fn for_user(
        conn: &mut AsyncPgConnection,
        user: Uuid,
    ) -> anyhow::Result<Vec<Notification>> {
        use crate::schema::notifications::dsl::*;

        let all = notifications
            .filter(user_id.eq(user))
            .order_by(created_at.desc())
            .select(Notification::as_select())
            .load::<Notification>(conn)
            .await?;

        Ok(all)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        user: Uuid,
        message_val: &str,
        url_val: Option<&str>,
    ) -> anyhow::Result<Notification> {
        use crate::schema::notifications::dsl::*;

        let notification = diesel::insert_into(notifications)
            .values((user_id.eq(user), message.eq(message_val), url.eq(url_val)))
            .get_result::<Notification>(conn)
            .await?;

        Ok(notification)
    }

    /// Mark one of the user's own notifications read. Returns the number of
    /// rows touched so callers can 404 on someone else's notification.
    pub async fn mark_read(
        conn: &mut AsyncPgConnection,
        notification_id: Uuid,
        user: Uuid,
    ) -> anyhow::Result<usize> {
        use crate::schema::notifications::dsl::*;

        let count = diesel::update(
            notifications.filter(id.eq(notification_id).and(user_id.eq(user))),
        )
        .set(read.eq(true))
        .execute(conn)
        .await?;

        Ok(count)
    }
}

// Leaderboard aggregation: group sold listings, count, top N.
pub mod leaderboard {
    use super::*;

    pub async fn top_sellers(
        conn: &mut AsyncPgConnection,
        n: i64,
    ) -> anyhow::Result<Vec<(Uuid, i64)>> {
        use crate::schema::listings::dsl::*;

        let rows = listings
            .filter(sold.eq(true))
            .group_by(seller_id)
            .select((seller_id, diesel::dsl::count_star()))
            .order_by(diesel::dsl::count_star().desc())
            .limit(n)
            .load::<(Uuid, i64)>(conn)
            .await?;

        Ok(rows)
    }

    pub async fn top_buyers(
        conn: &mut AsyncPgConnection,
        n: i64,
    ) -> anyhow::Result<Vec<(Uuid, i64)>> {
        use crate::schema::listings::dsl::*;

        let rows = listings
            .filter(sold.eq(true).and(buyer_id.is_not_null()))
            .group_by(buyer_id)
            .select((buyer_id, diesel::dsl::count_star()))
            .order_by(diesel::dsl::count_star().desc())
            .limit(n)
            .load::<(Option<Uuid>, i64)>(conn)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(buyer, count)| buyer.map(|b| (b, count)))
            .collect())
    }
}
