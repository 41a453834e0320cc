// Bounded retry through a stand-in: budgets from annotations and fixed
// policies, per-call state and the events each attempt leaves behind.
mod common;

#[cfg(test)]
mod test {
    use std::sync::{Arc, atomic::Ordering};

    use weft::{
        Aspect, FnTarget, Failure, Interceptor, MemoryEventSink, Phase, Value, Weaver,
        core::{RetryInterceptor, RetryPolicy},
    };

    use super::common::{self, ExamRepository, Flaky, ORDER_REPOSITORY};

    fn fixed_retry_weaver(attempts: u32, events: &Arc<MemoryEventSink>) -> Weaver {
        let mut weaver = Weaver::new(common::catalog()).with_event_sink(events.clone());
        let retry = RetryInterceptor::fixed(RetryPolicy::new(attempts).unwrap()).shared();
        weaver
            .register_aspect(Aspect::new("retry").advice("execution(* hello.aop.order..*(..))", retry))
            .unwrap();
        weaver
    }

    #[test]
    fn test_always_failing_call_uses_whole_budget() {
        for attempts in 1..=5u32 {
            let events = Arc::new(MemoryEventSink::new());
            let weaver = fixed_retry_weaver(attempts, &events);
            let target = Arc::new(Flaky::new(ORDER_REPOSITORY, usize::MAX));
            let proxy = weaver.register_bean("orderRepository", target.clone()).unwrap();
            events.clear();

            let err = proxy.invoke("save", vec![Value::from("itemA")]).unwrap_err();
            assert_eq!(target.calls(), attempts as usize);
            // the last failure is the one that surfaces
            assert_eq!(
                err.as_failure().unwrap().message(),
                format!("attempt {attempts}")
            );

            assert_eq!(events.count(Phase::RetryAttempt), attempts as usize);
            assert_eq!(events.count(Phase::RetryFailure), attempts as usize);
            let exhausted = events.of_phase(Phase::RetryExhausted);
            assert_eq!(exhausted.len(), 1);
            assert_eq!(exhausted[0].attempt, Some(attempts));
            assert_eq!(exhausted[0].advice.as_deref(), Some("retry.around#0"));
        }
    }

    #[test]
    fn test_success_after_failures_stops_retrying() {
        for failures in 0..5usize {
            let events = Arc::new(MemoryEventSink::new());
            let weaver = fixed_retry_weaver(5, &events);
            let target = Arc::new(Flaky::new(ORDER_REPOSITORY, failures));
            let proxy = weaver.register_bean("orderRepository", target.clone()).unwrap();
            events.clear();

            assert_eq!(
                proxy.invoke("save", vec![Value::from("itemA")]).unwrap(),
                Value::from("done")
            );
            assert_eq!(target.calls(), failures + 1);
            assert_eq!(events.count(Phase::RetryFailure), failures);
            assert_eq!(events.count(Phase::RetryExhausted), 0);
            assert_eq!(events.count(Phase::Failure), 0);
        }
    }

    #[test]
    fn test_budget_from_annotation_absorbs_periodic_failures() {
        let events = Arc::new(MemoryEventSink::new());
        let mut weaver = Weaver::new(common::catalog()).with_event_sink(events.clone());
        weaver
            .register_aspect(Aspect::new("retry").advice("@annotation(Retry)", RetryInterceptor::new().shared()))
            .unwrap();

        let target = Arc::new(ExamRepository::default());
        let exam = weaver.register_bean("examRepository", target.clone()).unwrap();
        events.clear();

        for i in 0..5 {
            let item = format!("data{i}");
            assert_eq!(
                exam.invoke("save", vec![Value::from(item.clone())]).unwrap(),
                Value::from(item)
            );
        }

        // the fifth call failed once and was retried
        assert_eq!(target.seq.load(Ordering::SeqCst), 6);
        assert_eq!(events.count(Phase::RetryAttempt), 6);
        assert_eq!(events.count(Phase::RetryFailure), 1);
        let retried: Vec<_> = events
            .of_phase(Phase::RetryAttempt)
            .into_iter()
            .filter_map(|e| e.attempt)
            .filter(|attempt| *attempt > 1)
            .collect();
        assert_eq!(retried, vec![2]);
    }

    #[test]
    fn test_unannotated_operation_gets_a_single_attempt() {
        let events = Arc::new(MemoryEventSink::new());
        let mut weaver = Weaver::new(common::catalog()).with_event_sink(events.clone());
        weaver
            .register_aspect(
                Aspect::new("retry").advice("execution(* hello.aop.order..*(..))", RetryInterceptor::new().shared()),
            )
            .unwrap();
        let target = Arc::new(Flaky::new(ORDER_REPOSITORY, 1));
        let proxy = weaver.register_bean("orderRepository", target.clone()).unwrap();

        assert!(proxy.invoke("save", vec![Value::from("itemA")]).is_err());
        assert_eq!(target.calls(), 1);
    }

    #[test]
    fn test_retry_reruns_inner_advice() {
        let events = Arc::new(MemoryEventSink::new());
        let mut weaver = fixed_retry_weaver(3, &events);
        weaver
            .register_aspect(Aspect::new("log").around("execution(* hello.aop.order..*(..))", |inv| {
                inv.proceed()
            }))
            .unwrap();
        let target = Arc::new(Flaky::new(ORDER_REPOSITORY, 2));
        let proxy = weaver.register_bean("orderRepository", target.clone()).unwrap();
        events.clear();

        proxy.invoke("save", vec![Value::from("itemA")]).unwrap();
        let log_entries = events
            .of_phase(Phase::AdviceEnter)
            .into_iter()
            .filter(|e| e.advice.as_deref() == Some("log.around#0"))
            .count();
        assert_eq!(log_entries, 3);
        assert_eq!(target.calls(), 3);
    }

    #[test]
    fn test_zero_annotation_budget_is_rejected_at_build() {
        let registry = weft::TypeRegistry::builder()
            .register(
                weft::TypeDescriptor::class("hello.aop.exam.Broken").method(
                    weft::MethodDecl::new("save")
                        .annotated(weft::AnnotationRef::new("Retry").with("value", 0)),
                ),
            )
            .build()
            .unwrap();
        let mut weaver = Weaver::new(registry);
        weaver
            .register_aspect(Aspect::new("retry").advice("@annotation(Retry)", RetryInterceptor::new().shared()))
            .unwrap();
        let target = FnTarget::new("hello.aop.exam.Broken")
            .on("save", |_| Ok(Value::Unit))
            .shared();
        assert!(matches!(
            weaver.register_bean("broken", target),
            Err(weft::AopError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_concurrent_calls_keep_separate_attempt_counts() {
        let events = Arc::new(MemoryEventSink::new());
        let weaver = fixed_retry_weaver(3, &events);
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = calls.clone();
        let target = FnTarget::new(ORDER_REPOSITORY)
            .on("save", move |args| {
                counter.fetch_add(1, Ordering::SeqCst);
                match args.first().and_then(Value::as_str) {
                    Some("bad") => Err(Failure::new("IllegalStateException", "bad item")),
                    _ => Ok(Value::from("ok")),
                }
            })
            .shared();
        let proxy = weaver.register_bean("orderRepository", target).unwrap();

        std::thread::scope(|scope| {
            for t in 0..8 {
                let proxy = &proxy;
                scope.spawn(move || {
                    for i in 0..20 {
                        let item = if (t + i) % 2 == 0 { "good" } else { "bad" };
                        let result = proxy.invoke("save", vec![Value::from(item)]);
                        assert_eq!(result.is_ok(), item == "good");
                    }
                });
            }
        });

        // 80 good calls once each, 80 bad calls three times each
        assert_eq!(calls.load(Ordering::SeqCst), 80 + 80 * 3);
        assert_eq!(events.count(Phase::RetryExhausted), 80);
        for exhausted in events.of_phase(Phase::RetryExhausted) {
            assert_eq!(exhausted.attempt, Some(3));
        }
    }
}
