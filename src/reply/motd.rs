use irc::proto::Response;
use tracing::trace;

use super::{Correlators, Flow, Key, Sequence};
use crate::Event;
use crate::listener::Scope;
use crate::raw::Reply;
use crate::session::State;

pub(super) fn start(correlators: &mut Correlators, _: &mut State, reply: &Reply) {
    if correlators.is_in_flight(Key::Motd) {
        trace!("motd already in flight");
        return;
    }

    let lines = vec![reply.text().to_string()];

    correlators.register(Sequence::new("motd", Some(Key::Motd), lines, decide, finalize));
}

fn decide(lines: &mut Vec<String>, _: &mut State, reply: &Reply) -> Flow {
    match reply.response() {
        Some(Response::RPL_MOTD) => {
            lines.push(reply.text().to_string());

            Flow::Continue
        }
        Some(Response::RPL_ENDOFMOTD) => Flow::Complete,
        _ => Flow::Continue,
    }
}

fn finalize(lines: Vec<String>, state: &mut State) {
    state.emit(Scope::Session, Event::Motd { lines });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::trigger;

    fn handle(correlators: &mut Correlators, state: &mut State, reply: Reply) {
        correlators.offer(state, &reply);
        trigger(correlators, state, &reply);
    }

    #[test]
    fn it_should_collect_motd_lines() {
        let mut state = State::new("zeta");
        let mut correlators = Correlators::new();

        handle(
            &mut correlators,
            &mut state,
            Reply::new(375, "zeta", Some("- irc.example.com Message of the day -")),
        );
        handle(&mut correlators, &mut state, Reply::new(372, "zeta", Some("- Be nice")));
        handle(
            &mut correlators,
            &mut state,
            Reply::new(353, "zeta = #rust", Some("alice")),
        );
        handle(&mut correlators, &mut state, Reply::new(372, "zeta", Some("- Have fun")));
        handle(
            &mut correlators,
            &mut state,
            Reply::new(376, "zeta", Some("End of /MOTD command.")),
        );

        let motd = state
            .queue
            .iter()
            .find_map(|(_, event)| match event {
                Event::Motd { lines } => Some(lines.clone()),
                _ => None,
            })
            .expect("motd was fired");

        assert_eq!(
            motd,
            vec![
                "- irc.example.com Message of the day -",
                "- Be nice",
                "- Have fun"
            ]
        );
    }
}
