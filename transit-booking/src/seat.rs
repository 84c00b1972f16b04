use transit_core::FieldError;

pub const SEAT_LABEL_PREFIX: &str = "Seat ";

/// Seat labels are enumerated "Seat 1" ..= "Seat {capacity}".
pub fn seat_label(number: u32) -> String {
    format!("{}{}", SEAT_LABEL_PREFIX, number)
}

/// Extracts the seat number from "Seat 14", "seat 14" or "14".
pub fn seat_number(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    let digits = match trimmed.get(..4) {
        Some(head) if head.eq_ignore_ascii_case("seat") => trimmed[4..].trim_start(),
        _ => trimmed,
    };
    digits.parse::<u32>().ok()
}

/// Canonical label for `raw`, checked against the vehicle capacity.
pub fn canonical_seat(raw: &str, capacity: u32) -> Result<String, FieldError> {
    let number = seat_number(raw).ok_or_else(|| {
        FieldError::new("seat_label", format!("'{}' is not a valid seat label", raw.trim()))
    })?;

    if number == 0 || number > capacity {
        return Err(FieldError::new(
            "seat_label",
            format!("seat must be between 1 and {}", capacity),
        ));
    }

    Ok(seat_label(number))
}

/// All seat labels for a vehicle of the given capacity, in seat order.
pub fn all_seats(capacity: u32) -> impl Iterator<Item = String> {
    (1..=capacity).map(seat_label)
}
