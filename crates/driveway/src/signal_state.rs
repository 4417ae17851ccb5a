//! Target aspect selection for a route's start signal

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    DrivewayError, Result,
    signal::{AdditionalSignal, MainAspect, Signal, Zs3Symbol},
};

/// Everything a signal can physically show
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupportedSignalStates {
    pub main: Vec<MainAspect>,
    pub zs3: Vec<Zs3Symbol>,
    pub zs3v: Vec<Zs3Symbol>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSignalState {
    pub signal: Uuid,
    pub main: MainAspect,
    pub zs3: Option<Zs3Symbol>,
    pub zs3v: Option<Zs3Symbol>,
    /// Symbols of additional signals without a selection rule
    pub additional: Vec<String>,
    pub supported: SupportedSignalStates,
}

/// Pick the aspect `signal` shows when a route starting at it is set.
///
/// A Zs3/Zs3v indicator is lit with `maximum_speed / 10` when the unit carries
/// that symbol. The main aspect is chosen by the first matching rule:
///
/// 1. a Zs3 symbol was selected and Hp2 is supported: Hp2
/// 2. Hp2 is supported but Hp1 is not: Hp2
/// 3. Hp1 is supported: Hp1
/// 4. Ks2 is supported: Ks2
///
/// Zs2/Zs2v units are not driven. A maximum speed of 0 counts as unrestricted.
pub fn resolve_signal_state(
    signal: &Signal,
    maximum_speed: Option<u32>,
) -> Result<ResolvedSignalState> {
    let candidate = maximum_speed
        .filter(|speed| *speed > 0)
        .and_then(Zs3Symbol::for_speed);

    let mut supported = SupportedSignalStates {
        main: signal.supported_states.clone(),
        ..Default::default()
    };
    let mut additional = Vec::new();
    let mut zs3 = None;
    let mut zs3v = None;

    for additional_signal in &signal.additional_signals {
        match additional_signal {
            AdditionalSignal::Zs3 { symbols, .. } => {
                extend_unique(&mut supported.zs3, symbols);
                if zs3.is_none() {
                    zs3 = candidate.filter(|c| symbols.contains(c));
                }
            }
            AdditionalSignal::Zs3v { symbols, .. } => {
                extend_unique(&mut supported.zs3v, symbols);
                if zs3v.is_none() {
                    zs3v = candidate.filter(|c| symbols.contains(c));
                }
            }
            AdditionalSignal::Zs2 { .. } | AdditionalSignal::Zs2v { .. } => {}
            AdditionalSignal::Other { symbols, .. } => {
                extend_unique(&mut additional, symbols);
            }
        }
    }

    let main = if zs3.is_some() && signal.supports(MainAspect::Hp2) {
        MainAspect::Hp2
    } else if signal.supports(MainAspect::Hp2) && !signal.supports(MainAspect::Hp1) {
        MainAspect::Hp2
    } else if signal.supports(MainAspect::Hp1) {
        MainAspect::Hp1
    } else if signal.supports(MainAspect::Ks2) {
        MainAspect::Ks2
    } else {
        return Err(DrivewayError::Configuration { signal: signal.id });
    };

    Ok(ResolvedSignalState {
        signal: signal.id,
        main,
        zs3,
        zs3v,
        additional,
        supported,
    })
}

fn extend_unique<T: Clone + PartialEq>(target: &mut Vec<T>, items: &[T]) {
    for item in items {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalKind;

    fn symbols(values: &[u8]) -> Vec<Zs3Symbol> {
        values
            .iter()
            .map(|v| Zs3Symbol::try_from(*v).unwrap())
            .collect()
    }

    fn main_signal(states: Vec<MainAspect>) -> Signal {
        Signal::new(Uuid::new_v4(), SignalKind::Main, Uuid::new_v4(), Uuid::new_v4())
            .with_supported_states(states)
    }

    fn zs3(values: &[u8]) -> AdditionalSignal {
        AdditionalSignal::Zs3 {
            id: Uuid::new_v4(),
            symbols: symbols(values),
        }
    }

    #[test]
    fn selected_zs3_promotes_hp2_over_hp1() {
        let signal = main_signal(vec![MainAspect::Hp1, MainAspect::Hp2])
            .with_additional_signal(zs3(&[4, 6, 10, 16]));

        let state = resolve_signal_state(&signal, Some(100)).unwrap();
        assert_eq!(state.main, MainAspect::Hp2);
        assert_eq!(state.zs3.map(|s| s.value()), Some(10));
    }

    #[test]
    fn hp1_wins_without_zs3_selection() {
        let signal = main_signal(vec![MainAspect::Hp1, MainAspect::Hp2])
            .with_additional_signal(zs3(&[4, 6, 10, 16]));

        let state = resolve_signal_state(&signal, Some(95)).unwrap();
        assert_eq!(state.main, MainAspect::Hp1);
        assert_eq!(state.zs3, None);
        assert_eq!(state.supported.zs3, symbols(&[4, 6, 10, 16]));
    }

    #[test]
    fn hp2_only_signal_shows_hp2() {
        let signal = main_signal(vec![MainAspect::Hp0, MainAspect::Hp2]);
        let state = resolve_signal_state(&signal, None).unwrap();
        assert_eq!(state.main, MainAspect::Hp2);
    }

    #[test]
    fn ks_signal_falls_back_to_ks2() {
        let signal = main_signal(vec![MainAspect::Ks2]);
        let state = resolve_signal_state(&signal, None).unwrap();
        assert_eq!(state.main, MainAspect::Ks2);
        assert!(state.additional.is_empty());
    }

    #[test]
    fn no_usable_aspect_is_a_configuration_error() {
        let signal = main_signal(vec![]);
        match resolve_signal_state(&signal, Some(60)) {
            Err(DrivewayError::Configuration { signal: id }) => assert_eq!(id, signal.id),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn zs3v_is_selected_independently() {
        let signal = main_signal(vec![MainAspect::Hp1]).with_additional_signal(
            AdditionalSignal::Zs3v {
                id: Uuid::new_v4(),
                symbols: symbols(&[6, 8]),
            },
        );

        let state = resolve_signal_state(&signal, Some(60)).unwrap();
        assert_eq!(state.zs3, None);
        assert_eq!(state.zs3v.map(|s| s.value()), Some(6));
        assert_eq!(state.main, MainAspect::Hp1);
    }

    #[test]
    fn zs2_is_ignored_and_other_symbols_are_catalogued() {
        let signal = main_signal(vec![MainAspect::Ks2])
            .with_additional_signal(AdditionalSignal::Zs2 {
                id: Uuid::new_v4(),
                symbols: vec!["A".into()],
            })
            .with_additional_signal(AdditionalSignal::Other {
                id: Uuid::new_v4(),
                symbols: vec!["Zs1".into(), "Zs7".into()],
            });

        let state = resolve_signal_state(&signal, Some(40)).unwrap();
        assert_eq!(state.additional, vec!["Zs1".to_string(), "Zs7".to_string()]);
        assert!(state.supported.zs3.is_empty());
    }

    #[test]
    fn zero_speed_selects_nothing() {
        let signal =
            main_signal(vec![MainAspect::Hp1, MainAspect::Hp2]).with_additional_signal(zs3(&[0, 4]));
        let state = resolve_signal_state(&signal, Some(0)).unwrap();
        assert_eq!(state.zs3, None);
        assert_eq!(state.main, MainAspect::Hp1);
    }

    #[test]
    fn resolution_is_repeatable() {
        let signal = main_signal(vec![MainAspect::Hp1, MainAspect::Hp2])
            .with_additional_signal(zs3(&[4, 6, 10, 16]));
        let first = resolve_signal_state(&signal, Some(100)).unwrap();
        let second = resolve_signal_state(&signal, Some(100)).unwrap();
        assert_eq!(first, second);
    }
}
