// src/parser.rs
//
// Frame validation and sequence accounting. A frame either decodes to exactly
// one typed message or bumps the invalid counter; nothing here allocates.

use crate::wire::{
    MessageHeader, MsgType, OrderAdd, OrderCancel, Quote, RawFrame, Trade, HEADER_LEN,
};

#[derive(Debug, Clone, Copy)]
pub enum Body {
    Quote(Quote),
    Trade(Trade),
    OrderAdd(OrderAdd),
    OrderCancel(OrderCancel),
}

#[derive(Debug, Clone, Copy)]
pub struct Message {
    pub header: MessageHeader,
    pub body: Body,
}

#[derive(Debug, Default)]
pub struct MessageParser {
    last_sequence: u32,
    gaps: u64,
    invalid: u64,
}

impl MessageParser {
    /// Validates framing and decodes the payload. Any failure counts once
    /// against `invalid_messages` and yields None.
    pub fn parse(&mut self, frame: &RawFrame) -> Option<Message> {
        let payload = frame.payload();
        if payload.len() < HEADER_LEN {
            self.invalid += 1;
            return None;
        }

        let header = MessageHeader::decode(payload);
        if header.msg_len == 0 || header.msg_len as usize > payload.len() {
            self.invalid += 1;
            return None;
        }

        let Some(msg_type) = MsgType::from_u16(header.msg_type) else {
            self.invalid += 1;
            return None;
        };
        if header.msg_len as usize != msg_type.wire_len() {
            self.invalid += 1;
            return None;
        }

        // Gap accounting: only forward jumps count. A regressed sequence is
        // accepted and becomes the new baseline.
        if self.last_sequence != 0 {
            let expected = u64::from(self.last_sequence) + 1;
            let seq = u64::from(header.sequence_num);
            if seq > expected {
                self.gaps += seq - expected;
            }
        }
        self.last_sequence = header.sequence_num;

        let body_bytes = &payload[HEADER_LEN..msg_type.wire_len()];
        let body = match msg_type {
            MsgType::Quote => Body::Quote(Quote::decode(body_bytes)),
            MsgType::Trade => Body::Trade(Trade::decode(body_bytes)),
            MsgType::OrderAdd => Body::OrderAdd(OrderAdd::decode(body_bytes)),
            MsgType::OrderCancel => Body::OrderCancel(OrderCancel::decode(body_bytes)),
        };
        Some(Message { header, body })
    }

    pub fn sequence_gaps(&self) -> u64 {
        self.gaps
    }

    pub fn invalid_messages(&self) -> u64 {
        self.invalid
    }

    /// Clears counters and the sequence baseline; the next valid message is
    /// treated as the first of the feed.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{encode_quote, Side, QUOTE_LEN};

    fn quote_frame(seq: u32) -> RawFrame {
        let mut frame = RawFrame::default();
        let q = Quote {
            symbol_id: 1001,
            bid_price: 1_500_000,
            ask_price: 1_500_050,
            bid_size: 100,
            ask_size: 100,
        };
        frame.len = encode_quote(&mut frame.bytes, seq, 0, &q);
        frame
    }

    #[test]
    fn accepts_valid_quote() {
        let mut p = MessageParser::default();
        let msg = p.parse(&quote_frame(1)).expect("valid quote");
        assert_eq!(msg.header.sequence_num, 1);
        assert!(matches!(msg.body, Body::Quote(q) if q.symbol_id == 1001));
        assert_eq!(p.sequence_gaps(), 0);
        assert_eq!(p.invalid_messages(), 0);
    }

    #[test]
    fn rejects_truncated_frame() {
        let mut p = MessageParser::default();
        let mut frame = quote_frame(1);
        frame.len = 4;
        assert!(p.parse(&frame).is_none());
        assert_eq!(p.invalid_messages(), 1);
    }

    #[test]
    fn rejects_zero_msg_len() {
        let mut p = MessageParser::default();
        let mut frame = quote_frame(1);
        frame.bytes[2] = 0;
        frame.bytes[3] = 0;
        assert!(p.parse(&frame).is_none());
        assert_eq!(p.invalid_messages(), 1);
    }

    #[test]
    fn rejects_msg_len_past_frame() {
        let mut p = MessageParser::default();
        let mut frame = quote_frame(1);
        frame.len = QUOTE_LEN - 1;
        assert!(p.parse(&frame).is_none());
        assert_eq!(p.invalid_messages(), 1);
    }

    #[test]
    fn rejects_unknown_type() {
        let mut p = MessageParser::default();
        let mut frame = quote_frame(1);
        frame.bytes[0] = 9;
        frame.bytes[1] = 0;
        assert!(p.parse(&frame).is_none());
        assert_eq!(p.invalid_messages(), 1);
    }

    #[test]
    fn rejects_size_mismatch_for_type() {
        let mut p = MessageParser::default();
        // A cancel-sized header claiming to be a quote.
        let mut frame = quote_frame(1);
        frame.bytes[2..4].copy_from_slice(&(40u16).to_le_bytes());
        assert!(p.parse(&frame).is_none());
        assert_eq!(p.invalid_messages(), 1);
        // Rejection happens before sequence accounting.
        assert_eq!(p.sequence_gaps(), 0);
    }

    #[test]
    fn counts_single_gap() {
        let mut p = MessageParser::default();
        for seq in [1, 3, 4] {
            assert!(p.parse(&quote_frame(seq)).is_some());
        }
        assert_eq!(p.sequence_gaps(), 1);
        assert_eq!(p.invalid_messages(), 0);
    }

    #[test]
    fn gap_width_accumulates() {
        let mut p = MessageParser::default();
        for seq in [1, 2, 5] {
            assert!(p.parse(&quote_frame(seq)).is_some());
        }
        assert_eq!(p.sequence_gaps(), 2);
    }

    #[test]
    fn replayed_sequence_leaves_counters_alone() {
        let mut p = MessageParser::default();
        let frame = quote_frame(1);
        for _ in 0..3 {
            assert!(p.parse(&frame).is_some());
        }
        assert_eq!(p.sequence_gaps(), 0);
        assert_eq!(p.invalid_messages(), 0);
    }

    #[test]
    fn regression_rebases_without_counting() {
        let mut p = MessageParser::default();
        for seq in [1, 5] {
            assert!(p.parse(&quote_frame(seq)).is_some());
        }
        assert_eq!(p.sequence_gaps(), 3);
        // Regression to 3: accepted, not counted, becomes the new baseline.
        assert!(p.parse(&quote_frame(3)).is_some());
        assert_eq!(p.sequence_gaps(), 3);
        // A jump from the rebased value counts relative to it.
        assert!(p.parse(&quote_frame(10)).is_some());
        assert_eq!(p.sequence_gaps(), 9);
    }

    #[test]
    fn reset_clears_baseline_and_counters() {
        let mut p = MessageParser::default();
        assert!(p.parse(&quote_frame(5)).is_some());
        let mut bad = quote_frame(6);
        bad.len = 4;
        assert!(p.parse(&bad).is_none());
        p.reset();
        assert_eq!(p.sequence_gaps(), 0);
        assert_eq!(p.invalid_messages(), 0);
        // First message after reset sets the baseline without gap counting.
        assert!(p.parse(&quote_frame(100)).is_some());
        assert_eq!(p.sequence_gaps(), 0);
    }

    #[test]
    fn decodes_order_add_fields() {
        let mut p = MessageParser::default();
        let mut frame = RawFrame::default();
        let add = OrderAdd {
            order_id: 77,
            symbol_id: 2,
            price: 999_900,
            size: 25,
            side: Side::Ask,
        };
        frame.len = crate::wire::encode_order_add(&mut frame.bytes, 1, 0, &add);
        let msg = p.parse(&frame).expect("valid add");
        match msg.body {
            Body::OrderAdd(a) => {
                assert_eq!(a.order_id, 77);
                assert_eq!(a.symbol_id, 2);
                assert_eq!(a.price, 999_900);
                assert_eq!(a.size, 25);
                assert_eq!(a.side, Side::Ask);
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }
}
