use crate::buffer::{ConnBuffer, Overflow};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Ok200,
    NotFound404,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok200 => 200,
            Status::NotFound404 => 404,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok200 => "OK",
            Status::NotFound404 => "Not Found",
        }
    }
}

/// Formats the status line (+ `Date` header for 200s) into `buffer` at
/// offset 0, ready to be streamed out by the file streamer.
pub fn write(buffer: &mut ConnBuffer, status: Status) -> Result<(), Overflow> {
    let head = match status {
        Status::Ok200 => {
            let now = chrono::Utc::now();
            format!("HTTP/1.0 200 OK\r\nDate: {} GMT\r\n\r\n", now.format("%a, %d %b %Y %H:%M:%S"))
        }
        Status::NotFound404 => "HTTP/1.0 404 Not Found\r\n\r\n".to_string(),
    };
    buffer.reset_for_send(head.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_200_has_date_header_and_terminator() {
        let mut buf = ConnBuffer::new();
        write(&mut buf, Status::Ok200).unwrap();
        let text = std::str::from_utf8(buf.received()).unwrap();
        assert!(text.starts_with("HTTP/1.0 200 OK\r\nDate: "));
        assert!(text.ends_with(" GMT\r\n\r\n"));
    }

    #[test]
    fn not_found_404_is_header_only() {
        let mut buf = ConnBuffer::new();
        write(&mut buf, Status::NotFound404).unwrap();
        assert_eq!(buf.received(), b"HTTP/1.0 404 Not Found\r\n\r\n");
    }
}
