use crate::display::booking_list;
use roombot_core::types::BookingId;
use roombot_engine::traits::BookingApi;

/// The user's bookings as printable lines, or the error line.
pub async fn booking_lines(api: &dyn BookingApi) -> Vec<String> {
    match api.list_bookings().await {
        Ok(list) => booking_list(&list),
        Err(e) => vec![format!("❌ Erreur: {}", e.user_message())],
    }
}

/// Parses the argument of `/delete <id>` (a leading `#` is accepted).
pub fn parse_booking_id(arg: &str) -> Option<BookingId> {
    arg.trim().trim_start_matches('#').parse().ok().map(BookingId)
}

/// Deletes straight from the list, without the chat confirmation, then relists.
///
/// The conversational context is left alone.
pub async fn delete_from_list(api: &dyn BookingApi, id: BookingId) -> Vec<String> {
    match api.delete_booking(id).await {
        Ok(_) => {
            tracing::info!("booking {id} deleted from the list");
            booking_lines(api).await
        }
        Err(e) => {
            tracing::warn!("deleting booking {id} failed: {e}");
            vec![format!("❌ Erreur: {}", e.user_message())]
        }
    }
}
