//! The `/api` route table. Writes authenticate through the `AuthUser` extractor in each handler.

use crate::handlers::{community, groups, market, music, notifications, orders, social, users};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(users::signup))
        .route("/users", get(users::list).post(users::signup))
        .route(
            "/users/:id",
            get(users::read).patch(users::update).put(users::update).delete(users::delete),
        )
        .route("/users/:id/follow", post(users::follow))
        .route("/users/:id/followers", get(users::followers))
        .route("/users/:id/following", get(users::following))
        .route("/profiles", get(users::list_profiles).post(users::create_profile))
        .route("/profiles/me", get(users::my_profile))
        .route("/profiles/by_user/:user_id", get(users::profile_by_user))
        .route(
            "/profiles/:id",
            get(users::read_profile)
                .patch(users::update_profile)
                .put(users::update_profile)
                .delete(users::delete_profile),
        )
}

fn music_routes() -> Router<AppState> {
    Router::new()
        .route("/tracks", get(music::list_tracks).post(music::create_track))
        .route("/tracks/upload", post(music::create_track))
        .route(
            "/tracks/:id",
            get(music::read_track)
                .patch(music::update_track)
                .put(music::update_track)
                .delete(music::delete_track),
        )
        .route("/tracks/:id/download", get(music::download_track))
        .route("/tracks/:id/favorite", post(music::toggle_like))
        .route("/tracks/:id/toggle-like", post(music::toggle_like))
        .route("/tracks/:id/comments", get(music::track_comments).post(music::add_track_comment))
        .route("/favorites", get(music::favorites))
        .route("/playlists", get(music::list_playlists).post(music::create_playlist))
        .route(
            "/playlists/:id",
            get(music::read_playlist)
                .patch(music::update_playlist)
                .put(music::update_playlist)
                .delete(music::delete_playlist),
        )
        .route("/playlists/:id/tracks", post(music::add_playlist_track))
        .route("/playlists/:id/tracks/:track_id", axum::routing::delete(music::remove_playlist_track))
        .route(
            "/comments/:id",
            get(music::read_comment)
                .patch(music::update_comment)
                .put(music::update_comment)
                .delete(music::delete_comment),
        )
        .route("/likes", get(music::list_likes).post(music::create_like))
        .route("/likes/:id", get(music::read_like).delete(music::delete_like))
        .route("/categories", get(music::list_categories).post(music::create_category))
        .route(
            "/categories/:id",
            get(music::read_category)
                .patch(music::update_category)
                .put(music::update_category)
                .delete(music::delete_category),
        )
}

fn social_routes() -> Router<AppState> {
    Router::new()
        .route("/social-posts", get(social::list).post(social::create))
        .route(
            "/social-posts/:id",
            get(social::read).patch(social::update).put(social::update).delete(social::delete),
        )
        .route("/social-posts/:id/like", post(social::toggle_like))
        .route("/social-posts/:id/save_post", post(social::toggle_save))
        .route("/social-posts/:id/comment", post(social::add_comment))
        .route("/social-posts/:id/comments", get(social::comments).post(social::add_comment))
        .route("/social-posts/:id/download", get(social::download))
        .route("/post-likes", get(social::list_likes).post(social::create_like))
        .route("/post-likes/:id", get(social::read_like).delete(social::delete_like))
        .route("/post-saves", get(social::list_saves).post(social::create_save))
        .route("/post-saves/:id", get(social::read_save).delete(social::delete_save))
        .route(
            "/post-comments",
            get(social::list_post_comments).post(social::create_post_comment),
        )
        .route(
            "/post-comments/:id",
            get(social::read_post_comment)
                .patch(social::update_post_comment)
                .put(social::update_post_comment)
                .delete(social::delete_post_comment),
        )
        .route("/notifications", get(notifications::list))
        .route("/notifications/unread_count", get(notifications::unread_count))
        .route("/notifications/mark_all_read", post(notifications::mark_all_read))
        .route("/notifications/:id", get(notifications::read).delete(notifications::delete))
        .route("/notifications/:id/mark_as_read", post(notifications::mark_as_read))
}

fn group_routes() -> Router<AppState> {
    Router::new()
        .route("/groups", get(groups::list).post(groups::create))
        .route(
            "/groups/:slug",
            get(groups::read).patch(groups::update).put(groups::update).delete(groups::delete),
        )
        .route("/groups/:slug/join", post(groups::join))
        .route("/groups/:slug/leave", post(groups::leave))
        .route("/groups/:slug/members", get(groups::members))
        .route("/groups/:slug/check-membership", get(groups::check_membership))
        .route("/groups/:slug/posts", get(groups::posts).post(groups::create_post))
        .route("/groups/:slug/join-requests", get(groups::join_requests))
        .route("/group-join-requests/:id/approve", post(groups::approve))
        .route("/group-join-requests/:id/reject", post(groups::reject))
}

fn community_routes() -> Router<AppState> {
    Router::new()
        .route("/churches", get(community::list_churches).post(community::create_church))
        .route("/churches/my_churches", get(community::my_churches))
        .route(
            "/churches/:id",
            get(community::read_church)
                .patch(community::update_church)
                .put(community::update_church)
                .delete(community::delete_church),
        )
        .route("/choirs", get(community::list_choirs).post(community::create_choir))
        .route("/choirs/my_choirs", get(community::my_choirs))
        .route(
            "/choirs/:id",
            get(community::read_choir)
                .patch(community::update_choir)
                .put(community::update_choir)
                .delete(community::delete_choir),
        )
        .route("/choirs/:id/toggle_active", post(community::toggle_choir_active))
        .route("/choirs/:id/update_members", post(community::update_choir_members))
        .route("/video-studios", get(community::list_studios).post(community::create_studio))
        .route("/video-studios/my_videostudios", get(community::my_studios))
        .route(
            "/video-studios/:id",
            get(community::read_studio)
                .patch(community::update_studio)
                .put(community::update_studio)
                .delete(community::delete_studio),
        )
        .route(
            "/live-events",
            get(community::list_live_events).post(community::create_live_event),
        )
        .route(
            "/live-events/:id",
            get(community::read_live_event)
                .patch(community::update_live_event)
                .put(community::update_live_event)
                .delete(community::delete_live_event),
        )
        .route("/live-events/:id/join", post(community::join_live_event))
        .route("/live-events/:id/end", post(community::end_live_event))
}

fn market_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/product-categories",
            get(market::list_categories).post(market::create_category),
        )
        .route("/product-categories/:id", get(market::read_category))
        .route("/products", get(market::list_products).post(market::create_product))
        .route(
            "/products/:id",
            get(market::read_product)
                .patch(market::update_product)
                .put(market::update_product)
                .delete(market::delete_product),
        )
        .route("/products/:id/reviews", get(market::list_reviews).post(market::create_review))
        .route("/wishlist", get(market::wishlist))
        .route("/wishlist/toggle", post(market::toggle_wishlist))
        .route("/cart", get(orders::cart))
        .route("/cart/items", post(orders::add_item))
        .route(
            "/cart/items/:id",
            axum::routing::patch(orders::update_item).delete(orders::remove_item),
        )
        .route("/cart/checkout", post(orders::checkout))
        .route("/orders", get(orders::list))
        .route("/orders/:id", get(orders::read))
        .route("/orders/:id/pay", post(orders::pay))
        .route("/orders/:id/cancel", post(orders::cancel))
        .route("/orders/:id/status", post(orders::advance))
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(user_routes())
        .merge(music_routes())
        .merge(social_routes())
        .merge(group_routes())
        .merge(community_routes())
        .merge(market_routes())
}
