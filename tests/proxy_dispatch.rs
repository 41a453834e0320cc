// Stand-in construction: strategy selection, views, this/target, final
// operations and the cost of dynamic-only pointcuts.
mod common;

#[cfg(test)]
mod test {
    use std::sync::{Arc, atomic::Ordering};

    use weft::{
        AopError, Aspect, FnTarget, MemoryEventSink, MethodDecl, Phase, StrategyKind,
        TypeDescriptor, TypeRegistry, Value, Visibility, Weaver,
        config::models::{BeanProxyConfig, ProxyConfig, StrategyChoice},
    };

    use super::common::{
        self, MEMBER_SERVICE, MEMBER_SERVICE_IMPL, MemberServiceImpl, OBJECT_STORE, SEALED_CLOCK,
    };

    fn surface_config() -> ProxyConfig {
        ProxyConfig {
            target_class: false,
            ..ProxyConfig::default()
        }
    }

    fn member_weaver(config: ProxyConfig, events: Arc<MemoryEventSink>) -> Weaver {
        let mut weaver = Weaver::new(common::catalog())
            .with_event_sink(events)
            .with_proxy_config(config);
        weaver
            .register_aspect(
                Aspect::new("log").around("execution(* hello.aop.member..*(..))", |inv| inv.proceed()),
            )
            .unwrap();
        weaver
    }

    #[test]
    fn test_surface_stand_in_rejects_concrete_view() {
        let events = Arc::new(MemoryEventSink::new());
        let weaver = member_weaver(surface_config(), events);
        let proxy = weaver
            .register_bean("memberService", Arc::new(MemberServiceImpl::default()))
            .unwrap();

        assert_eq!(proxy.strategy(), StrategyKind::Surface);
        assert!(proxy.is_instance_of(MEMBER_SERVICE));
        assert!(!proxy.is_instance_of(MEMBER_SERVICE_IMPL));

        let err = proxy.view("MemberServiceImpl").unwrap_err();
        assert!(matches!(
            err,
            AopError::TypeMismatch {
                strategy: "surface-based",
                ..
            }
        ));

        let surface = proxy.view("MemberService").unwrap();
        assert_eq!(surface.type_name(), MEMBER_SERVICE);
        assert_eq!(
            surface.invoke("hello", vec![Value::from("kim")]).unwrap(),
            Value::from("ok")
        );

        // the interface never declared internal
        assert!(matches!(
            proxy.invoke("internal", vec![Value::from("kim")]),
            Err(AopError::NotFound { .. })
        ));
    }

    #[test]
    fn test_subtype_stand_in_accepts_concrete_view() {
        let events = Arc::new(MemoryEventSink::new());
        let weaver = member_weaver(ProxyConfig::default(), events.clone());
        let proxy = weaver
            .register_bean("memberService", Arc::new(MemberServiceImpl::default()))
            .unwrap();

        assert_eq!(proxy.strategy(), StrategyKind::Subtype);
        assert!(proxy.is_instance_of(MEMBER_SERVICE));
        assert!(proxy.is_instance_of("Object"));

        let concrete = proxy.view("MemberServiceImpl").unwrap();
        events.clear();
        concrete.invoke("internal", vec![Value::from("kim")]).unwrap();
        assert_eq!(events.count(Phase::AdviceEnter), 1);

        // operations seen through the interface view stay limited to it
        let surface = proxy.view("MemberService").unwrap();
        assert!(surface.invoke("internal", vec![Value::from("kim")]).is_err());
    }

    #[test]
    fn test_stand_in_preserves_signatures() {
        let registry = common::catalog();
        let events = Arc::new(MemoryEventSink::new());
        let weaver = member_weaver(surface_config(), events);
        let proxy = weaver
            .register_bean("memberService", Arc::new(MemberServiceImpl::default()))
            .unwrap();

        let original = registry.describe(MEMBER_SERVICE_IMPL, "hello").unwrap();
        assert_eq!(proxy.describe("hello").unwrap(), &original);
        assert_eq!(
            original.to_string(),
            "String hello.aop.member.MemberServiceImpl.hello(String)"
        );
        assert!(proxy.chain_for(&original).is_some());
    }

    #[test]
    fn test_per_bean_strategy_override() {
        let mut config = surface_config();
        config.beans.insert(
            "memberService".to_string(),
            BeanProxyConfig {
                strategy: StrategyChoice::Subtype,
            },
        );
        let weaver = member_weaver(config, Arc::new(MemoryEventSink::new()));
        let proxy = weaver
            .register_bean("memberService", Arc::new(MemberServiceImpl::default()))
            .unwrap();
        assert_eq!(proxy.strategy(), StrategyKind::Subtype);
    }

    #[test]
    fn test_forced_surface_without_interface_is_unproxyable() {
        let mut config = ProxyConfig::default();
        config.beans.insert(
            "objectStore".to_string(),
            BeanProxyConfig {
                strategy: StrategyChoice::Surface,
            },
        );
        let mut weaver = Weaver::new(common::catalog()).with_proxy_config(config);
        weaver
            .register_aspect(Aspect::new("all").before("execution(* *(..))", |_| Ok(())))
            .unwrap();
        let result = weaver.register_bean("objectStore", Arc::new(common::Echo(OBJECT_STORE)));
        assert!(matches!(result, Err(AopError::Unproxyable { .. })));
        assert!(weaver.bean("objectStore").is_err());
    }

    #[test]
    fn test_this_and_target_by_strategy() {
        for (config, this_impl_matches) in [(surface_config(), false), (ProxyConfig::default(), true)] {
            let events = Arc::new(MemoryEventSink::new());
            let mut weaver = Weaver::new(common::catalog())
                .with_event_sink(events.clone())
                .with_proxy_config(config);
            weaver
                .register_aspect(
                    Aspect::new("this_iface").around("this(hello.aop.member.MemberService)", |inv| {
                        inv.proceed()
                    }),
                )
                .unwrap();
            weaver
                .register_aspect(
                    Aspect::new("this_impl").around("this(hello.aop.member.MemberServiceImpl)", |inv| {
                        inv.proceed()
                    }),
                )
                .unwrap();
            weaver
                .register_aspect(
                    Aspect::new("target_impl")
                        .around("target(hello.aop.member.MemberServiceImpl)", |inv| inv.proceed()),
                )
                .unwrap();

            let proxy = weaver
                .register_bean("memberService", Arc::new(MemberServiceImpl::default()))
                .unwrap();
            events.clear();
            proxy.invoke("hello", vec![Value::from("kim")]).unwrap();

            let entered: Vec<_> = events
                .of_phase(Phase::AdviceEnter)
                .into_iter()
                .filter_map(|e| e.advice)
                .collect();
            let mut expected = vec!["this_iface.around#0"];
            if this_impl_matches {
                expected.push("this_impl.around#0");
            }
            expected.push("target_impl.around#0");
            assert_eq!(entered, expected, "strategy {}", proxy.strategy());
        }
    }

    #[test]
    fn test_final_operation_goes_straight_to_target() {
        let events = Arc::new(MemoryEventSink::new());
        let mut weaver = Weaver::new(common::catalog()).with_event_sink(events.clone());
        weaver
            .register_aspect(Aspect::new("all").around("within(hello.aop.pointcut..*)", |inv| {
                inv.proceed()
            }))
            .unwrap();
        let store = weaver
            .register_bean("objectStore", Arc::new(common::Echo(OBJECT_STORE)))
            .unwrap();
        events.clear();

        assert_eq!(store.invoke("describe", vec![]).unwrap(), Value::from("describe"));
        assert_eq!(events.count(Phase::AdviceEnter), 0);

        store.invoke("store", vec![Value::from("x")]).unwrap();
        assert_eq!(events.count(Phase::AdviceEnter), 1);
    }

    #[test]
    fn test_unadvised_bean_is_a_direct_handle() {
        let weaver = member_weaver(ProxyConfig::default(), Arc::new(MemoryEventSink::new()));
        let target = Arc::new(common::Echo(OBJECT_STORE));
        let proxy = weaver.register_bean("objectStore", target).unwrap();

        assert!(!proxy.is_aop_proxy());
        assert_eq!(proxy.strategy(), StrategyKind::Direct);
        assert!(proxy.is_instance_of(OBJECT_STORE));
        assert!(proxy.operations().all(|sig| proxy.chain_for(sig).is_none()));
    }

    #[test]
    fn test_dynamic_only_pointcut_wraps_every_bean() {
        let events = Arc::new(MemoryEventSink::new());
        let mut weaver = Weaver::new(common::catalog()).with_event_sink(events.clone());
        weaver
            .register_aspect(Aspect::new("annotated").around("@target(ClassAop)", |inv| inv.proceed()))
            .unwrap();

        // nothing rules the store out before a call, so it is wrapped
        let store = weaver
            .register_bean("objectStore", Arc::new(common::Echo(OBJECT_STORE)))
            .unwrap();
        assert!(store.is_aop_proxy());
        events.clear();
        store.invoke("store", vec![Value::from("x")]).unwrap();
        assert_eq!(events.count(Phase::AdviceEnter), 0);
        assert_eq!(events.of_phase(Phase::MatchDecision)[0].matched, Some(false));

        // and a sealed type cannot be wrapped at all
        let clock = weaver.register_bean("clock", Arc::new(common::Echo(SEALED_CLOCK)));
        assert!(matches!(clock, Err(AopError::Unproxyable { .. })));

        // narrowing with a static designator avoids both
        let mut narrowed = Weaver::new(common::catalog());
        narrowed
            .register_aspect(
                Aspect::new("annotated")
                    .around("within(hello.aop.member..*) && @target(ClassAop)", |inv| inv.proceed()),
            )
            .unwrap();
        let clock = narrowed
            .register_bean("clock", Arc::new(common::Echo(SEALED_CLOCK)))
            .unwrap();
        assert!(!clock.is_aop_proxy());
    }

    #[test]
    fn test_concurrent_calls_share_one_stand_in() {
        let events = Arc::new(MemoryEventSink::new());
        let weaver = member_weaver(ProxyConfig::default(), events.clone());
        let target = Arc::new(MemberServiceImpl::default());
        let proxy = weaver.register_bean("memberService", target.clone()).unwrap();
        events.clear();

        std::thread::scope(|scope| {
            for t in 0..8 {
                let proxy = &proxy;
                scope.spawn(move || {
                    for i in 0..50 {
                        let name = format!("user-{t}-{i}");
                        assert_eq!(
                            proxy.invoke("hello", vec![Value::from(name)]).unwrap(),
                            Value::from("ok")
                        );
                    }
                });
            }
        });

        assert_eq!(target.calls.load(Ordering::SeqCst), 400);
        assert_eq!(events.count(Phase::AdviceEnter), 400);
        // every call has its own id carrying enter, invoke, return and exit
        for enter in events.of_phase(Phase::AdviceEnter) {
            let id = enter.invocation.unwrap();
            assert_eq!(events.for_invocation(id).len(), 4);
        }
    }

    fn finder_registry() -> TypeRegistry {
        TypeRegistry::builder()
            .register(
                TypeDescriptor::class("app.Finder")
                    .method(MethodDecl::new("find").param("String").returns("String"))
                    .method(MethodDecl::new("find").param("int").returns("String"))
                    .method(
                        MethodDecl::new("scan")
                            .returns("String")
                            .visibility(Visibility::Private),
                    ),
            )
            .register(
                TypeDescriptor::class("app.Clock")
                    .sealed()
                    .method(MethodDecl::new("now").returns("long"))
                    .method(
                        MethodDecl::new("tick")
                            .returns("long")
                            .visibility(Visibility::Private),
                    ),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_describe_overload_picks_exact_parameters() {
        let mut weaver = Weaver::new(finder_registry());
        weaver
            .register_aspect(Aspect::new("log").around("execution(* app..*(int))", |inv| inv.proceed()))
            .unwrap();
        let target = FnTarget::new("app.Finder")
            .on("find", |args| Ok(Value::from(format!("found {}", args[0]))))
            .shared();
        let finder = weaver.register_bean("finder", target).unwrap();

        let by_int = finder.describe_overload("find", &["int"]).unwrap();
        assert_eq!(by_int.to_string(), "String app.Finder.find(int)");
        assert!(finder.chain_for(by_int).is_some());

        let by_string = finder.describe_overload("find", &["String"]).unwrap();
        assert_eq!(by_string.parameter_types, vec!["String".to_string()]);
        assert!(finder.chain_for(by_string).is_none());

        assert!(matches!(
            finder.describe_overload("find", &["boolean"]),
            Err(AopError::NotFound { kind: "operation", .. })
        ));
        assert_eq!(
            finder.invoke_signature(by_int, vec![Value::Int(7)]).unwrap(),
            Value::from("found 7")
        );
    }

    #[test]
    fn test_advice_on_private_operations_only_does_not_wrap() {
        let mut weaver = Weaver::new(finder_registry());
        weaver
            .register_aspect(Aspect::new("log").before("execution(private * *(..))", |_| Ok(())))
            .unwrap();

        let finder = weaver
            .register_bean("finder", FnTarget::new("app.Finder").shared())
            .unwrap();
        assert!(!finder.is_aop_proxy());
        assert_eq!(finder.strategy(), StrategyKind::Direct);

        // a sealed type is fine as long as nothing it exposes is advised
        let clock = weaver
            .register_bean("clock", FnTarget::new("app.Clock").shared())
            .unwrap();
        assert_eq!(clock.strategy(), StrategyKind::Direct);
    }
}
